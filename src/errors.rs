// src/errors.rs

//! Crate-wide error type, result alias and the stable error codes sent back
//! to the client in `error` replies.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid payload for '{command}': {message}")]
    InvalidPayload { command: String, message: String },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Transition '{trigger}' is not allowed from state '{state}'")]
    InvalidTransition { trigger: String, state: String },

    #[error("Unknown launcher module '{module}' (expected strategy {identifier})")]
    UnknownLauncher { module: String, identifier: String },

    #[error("Launcher '{launcher}' failed: {message}")]
    LauncherFailed { launcher: String, message: String },

    #[error("Launcher '{launcher}' did not become ready within {waited:?}")]
    LaunchTimedOut { launcher: String, waited: Duration },

    #[error("Lint failed:\n{0}")]
    LintFailed(String),

    #[error("Application error: {0}")]
    Application(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ManagerError {
    /// Short machine-readable code carried in `error` replies.
    pub fn code(&self) -> &'static str {
        match self {
            ManagerError::ConfigError(_) => "config",
            ManagerError::InvalidPayload { .. } => "invalid_payload",
            ManagerError::UnknownCommand(_) => "unknown_command",
            ManagerError::InvalidTransition { .. } => "invalid_transition",
            ManagerError::UnknownLauncher { .. } => "unknown_launcher",
            ManagerError::LauncherFailed { .. } => "launcher",
            ManagerError::LaunchTimedOut { .. } => "launch_timeout",
            ManagerError::LintFailed(_) => "lint",
            ManagerError::Application(_) => "application",
            ManagerError::IoError(_) => "io",
            ManagerError::TomlError(_) => "toml",
            ManagerError::JsonError(_) => "json",
            ManagerError::Other(_) => "internal",
        }
    }

    pub fn launcher(launcher: impl Into<String>, message: impl Into<String>) -> Self {
        ManagerError::LauncherFailed {
            launcher: launcher.into(),
            message: message.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ManagerError>;
