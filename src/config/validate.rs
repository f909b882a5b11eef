// src/config/validate.rs

use regex::Regex;

use crate::config::model::{RawSettings, Settings};
use crate::errors::{ManagerError, Result};

impl TryFrom<RawSettings> for Settings {
    type Error = crate::errors::ManagerError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_raw_settings(&raw)?;
        Ok(Settings::new_unchecked(raw))
    }
}

fn validate_raw_settings(cfg: &RawSettings) -> Result<()> {
    validate_server(cfg)?;
    validate_workspace(cfg)?;
    validate_launch(cfg)?;
    validate_visualization(cfg)?;
    validate_application(cfg)?;
    validate_lint(cfg)?;
    Ok(())
}

fn validate_server(cfg: &RawSettings) -> Result<()> {
    if cfg.server.queue_capacity == 0 {
        return Err(ManagerError::ConfigError(
            "[server].queue_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_workspace(cfg: &RawSettings) -> Result<()> {
    if cfg.workspace.root.as_os_str().is_empty() {
        return Err(ManagerError::ConfigError(
            "[workspace].root must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_launch(cfg: &RawSettings) -> Result<()> {
    if !matches!(cfg.launch.ros_version, 1 | 2) {
        return Err(ManagerError::ConfigError(format!(
            "[launch].ros_version must be 1 or 2 (got {})",
            cfg.launch.ros_version
        )));
    }
    if cfg.launch.poll_interval.is_zero() {
        return Err(ManagerError::ConfigError(
            "[launch].poll_interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_visualization(cfg: &RawSettings) -> Result<()> {
    if cfg.visualization.relay_port == 0 {
        return Err(ManagerError::ConfigError(
            "[visualization].relay_port must not be 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_application(cfg: &RawSettings) -> Result<()> {
    if cfg.application.interpreter.trim().is_empty() {
        return Err(ManagerError::ConfigError(
            "[application].interpreter must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_lint(cfg: &RawSettings) -> Result<()> {
    Regex::new(&cfg.lint.error_pattern).map_err(|e| {
        ManagerError::ConfigError(format!("[lint].error_pattern is not a valid regex: {e}"))
    })?;
    Ok(())
}
