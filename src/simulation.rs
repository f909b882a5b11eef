// src/simulation.rs

//! Control over simulated time.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::application::AppFuture;
use crate::config::SimulationSection;
use crate::errors::{ManagerError, Result};

pub trait WorldControl: Send + Sync {
    fn pause(&self) -> AppFuture<'_, Result<()>>;
    fn unpause(&self) -> AppFuture<'_, Result<()>>;
    /// Put the world back to its initial state.
    fn reset(&self) -> AppFuture<'_, Result<()>>;
}

/// Runs one shell command per operation; a missing command is a no-op.
#[derive(Debug, Clone, Default)]
pub struct CommandWorldControl {
    pause: Option<String>,
    unpause: Option<String>,
    reset: Option<String>,
}

impl CommandWorldControl {
    pub fn new(pause: Option<String>, unpause: Option<String>, reset: Option<String>) -> Self {
        Self {
            pause,
            unpause,
            reset,
        }
    }

    /// Configured commands, falling back to the Gazebo physics services of
    /// the given ROS version.
    pub fn from_settings(settings: &SimulationSection, ros_version: u8) -> Self {
        let service = |name: &str| -> String {
            if ros_version == 1 {
                format!("rosservice call /gazebo/{name}")
            } else {
                format!("ros2 service call /{name} std_srvs/srv/Empty")
            }
        };
        Self {
            pause: Some(settings.pause_command.clone().unwrap_or_else(|| service("pause_physics"))),
            unpause: Some(
                settings
                    .unpause_command
                    .clone()
                    .unwrap_or_else(|| service("unpause_physics")),
            ),
            reset: Some(settings.reset_command.clone().unwrap_or_else(|| service("reset_world"))),
        }
    }

    /// Control that does nothing (worlds without simulated time).
    pub fn disabled() -> Self {
        Self::default()
    }
}

impl WorldControl for CommandWorldControl {
    fn pause(&self) -> AppFuture<'_, Result<()>> {
        Box::pin(run_control("pause", self.pause.as_deref()))
    }

    fn unpause(&self) -> AppFuture<'_, Result<()>> {
        Box::pin(run_control("unpause", self.unpause.as_deref()))
    }

    fn reset(&self) -> AppFuture<'_, Result<()>> {
        Box::pin(run_control("reset", self.reset.as_deref()))
    }
}

async fn run_control(operation: &str, command: Option<&str>) -> Result<()> {
    let Some(command) = command else {
        debug!(operation, "no simulation command configured");
        return Ok(());
    };

    debug!(operation, cmd = %command, "running simulation command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .output()
        .await?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(operation, status = ?output.status.code(), stderr = %stderr.trim(), "simulation command failed");
        Err(ManagerError::Other(anyhow::anyhow!(
            "simulation {operation} failed with status {:?}: {}",
            output.status.code(),
            stderr.trim()
        )))
    }
}
