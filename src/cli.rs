// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `sandbox-manager`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sandbox-manager",
    version,
    about = "Control plane for a robotics simulation sandbox.",
    long_about = None
)]
pub struct CliArgs {
    /// Host to listen on (0.0.0.0 for all interfaces).
    #[arg(value_name = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the command WebSocket.
    #[arg(value_name = "PORT", default_value_t = 7163)]
    pub port: u16,

    /// Optional settings file (TOML). Built-in defaults are used when omitted.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SANDBOX_MANAGER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load settings, print the launcher catalog and registry, then exit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
