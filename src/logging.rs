// src/logging.rs

//! Log output of the manager process.
//!
//! Everything goes to stderr through one `tracing` subscriber. Output of
//! launched programs that has no log file of its own is forwarded line by
//! line at `debug`, tagged with `launcher` and `stream` fields, so at debug
//! level simulator and user-code output shows up interleaved with the
//! lifecycle events that caused it.
//!
//! Filter selection:
//! 1. `--log-level` applies one level to every target.
//! 2. Otherwise `SANDBOX_MANAGER_LOG` is read as `EnvFilter` directives,
//!    e.g. `info,sandbox_manager::exec=debug` to follow process teardown
//!    without the rest of the debug output.
//! 3. Otherwise `info`.
//!
//! Directives that do not parse are reported once and replaced by `info`.

use anyhow::{Result, anyhow};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "SANDBOX_MANAGER_LOG";
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let (filter, rejected) = build_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))?;

    if let Some(directives) = rejected {
        warn!(var = LOG_ENV_VAR, %directives, "invalid log filter; using {DEFAULT_DIRECTIVE}");
    }
    Ok(())
}

/// Directive string the filter is built from.
pub fn filter_directive(cli_level: Option<LogLevel>, env: Option<&str>) -> String {
    match cli_level {
        Some(level) => level_directive(level).to_string(),
        None => env
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DIRECTIVE)
            .to_string(),
    }
}

/// The filter to install, plus the directives that were rejected if they
/// did not parse.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> (EnvFilter, Option<String>) {
    let directive = filter_directive(cli_level, env);
    match EnvFilter::try_new(&directive) {
        Ok(filter) => (filter, None),
        Err(_) => (EnvFilter::new(DEFAULT_DIRECTIVE), Some(directive)),
    }
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
