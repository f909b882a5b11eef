// src/config/launch.rs

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ManagerError, Result};
use crate::types::LauncherKind;

/// Configuration carried by a `launch_world` command.
///
/// ```json
/// {
///   "world": "gazebo",
///   "launch_file": "/opt/exercises/follow_line.launch.py",
///   "name": "Follow Line",
///   "exercise_id": "follow_line",
///   "launchers": {
///     "0": { "type": "module", "module": "teleoperator_ros2", "port": 7164 }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchConfiguration {
    pub world: String,
    pub launch_file: String,
    pub name: String,
    pub exercise_id: String,

    /// Visualization profile to use later; may also be given to
    /// `prepare_visualization` directly.
    #[serde(default)]
    pub visualization: Option<String>,

    /// Extra launchers started after the world, in ascending key order.
    #[serde(default)]
    pub launchers: BTreeMap<String, LauncherSpec>,
}

impl LaunchConfiguration {
    /// Parse and validate the `data` field of a launch command.
    ///
    /// Any missing or mistyped field rejects the whole configuration.
    pub fn from_payload(data: Option<Value>) -> Result<Self> {
        let data = data.ok_or_else(|| {
            ManagerError::ConfigError("launch configuration payload is missing".to_string())
        })?;
        let config: LaunchConfiguration = serde_json::from_value(data)
            .map_err(|e| ManagerError::ConfigError(format!("invalid launch configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("world", &self.world),
            ("launch_file", &self.launch_file),
            ("name", &self.name),
            ("exercise_id", &self.exercise_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ManagerError::ConfigError(format!(
                    "launch configuration field '{field}' must not be empty"
                )));
            }
        }

        for (key, spec) in &self.launchers {
            if key.is_empty() {
                return Err(ManagerError::ConfigError(
                    "launcher keys must not be empty".to_string(),
                ));
            }
            spec.validate(key)?;
        }

        Ok(())
    }
}

/// One entry of the `launchers` map: `{type, module, ...parameters}`.
///
/// Every key other than `type` and `module` is kept in `parameters` and
/// deserialized by the strategy into its own parameter struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherSpec {
    #[serde(rename = "type", default)]
    pub kind: LauncherKind,

    #[serde(default)]
    pub module: String,

    #[serde(flatten)]
    pub parameters: BTreeMap<String, Value>,
}

impl LauncherSpec {
    /// A `type = "module"` spec without parameters.
    pub fn module(name: impl Into<String>) -> Self {
        Self {
            kind: LauncherKind::Module,
            module: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// A `type = "command"` spec running `command` through the shell.
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            kind: LauncherKind::Command,
            module: "command".to_string(),
            parameters: BTreeMap::new(),
        }
        .with_param("command", Value::String(command.into()))
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Deserialize the parameters into a strategy-specific struct.
    pub fn parameters_as<T: DeserializeOwned>(&self) -> Result<T> {
        let object: serde_json::Map<String, Value> = self
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::from_value(Value::Object(object)).map_err(|e| {
            ManagerError::ConfigError(format!(
                "invalid parameters for launcher module '{}': {e}",
                self.module
            ))
        })
    }

    fn validate(&self, key: &str) -> Result<()> {
        match self.kind {
            LauncherKind::Module => {
                if self.module.trim().is_empty() {
                    return Err(ManagerError::ConfigError(format!(
                        "launcher '{key}' has type \"module\" but no module name"
                    )));
                }
            }
            LauncherKind::Command => {
                let has_command = self
                    .parameters
                    .get("command")
                    .and_then(Value::as_str)
                    .is_some_and(|c| !c.trim().is_empty());
                if !has_command {
                    return Err(ManagerError::ConfigError(format!(
                        "launcher '{key}' has type \"command\" but no \"command\" string"
                    )));
                }
            }
        }
        Ok(())
    }
}
