// src/manager/command.rs

use serde_json::Value;

use crate::application::CodeSubmission;
use crate::config::LaunchConfiguration;
use crate::errors::{ManagerError, Result};
use crate::manager::fsm::Trigger;
use crate::transport::InboundMessage;

/// A client command with its payload parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    LaunchWorld(LaunchConfiguration),
    PrepareVisualization(String),
    /// `None` resumes paused code without reloading it.
    RunApplication(Option<CodeSubmission>),
    Pause,
    Resume,
    Stop,
    Terminate,
    Disconnect,
}

impl Command {
    /// Map a command name (including its aliases) to its trigger.
    pub fn trigger_for(name: &str) -> Option<Trigger> {
        let trigger = match name {
            "connect" => Trigger::Connect,
            "launch_world" | "launch" => Trigger::LaunchWorld,
            "prepare_visualization" => Trigger::PrepareVisualization,
            "run_application" | "run" => Trigger::RunApplication,
            "pause" => Trigger::Pause,
            "resume" => Trigger::Resume,
            "stop" => Trigger::Stop,
            "terminate" => Trigger::Terminate,
            "disconnect" => Trigger::Disconnect,
            _ => return None,
        };
        Some(trigger)
    }

    pub fn parse(message: &InboundMessage) -> Result<Self> {
        let trigger = Self::trigger_for(&message.command)
            .ok_or_else(|| ManagerError::UnknownCommand(message.command.clone()))?;
        let data = message.data.clone();

        let command = match trigger {
            Trigger::Connect => Command::Connect,
            Trigger::LaunchWorld => Command::LaunchWorld(LaunchConfiguration::from_payload(data)?),
            Trigger::PrepareVisualization => Command::PrepareVisualization(visualization_profile(data)?),
            Trigger::RunApplication => Command::RunApplication(CodeSubmission::from_payload(data)?),
            Trigger::Pause => Command::Pause,
            Trigger::Resume => Command::Resume,
            Trigger::Stop => Command::Stop,
            Trigger::Terminate => Command::Terminate,
            Trigger::Disconnect => Command::Disconnect,
            Trigger::LauncherDied => return Err(ManagerError::UnknownCommand(message.command.clone())),
        };
        Ok(command)
    }

    pub fn trigger(&self) -> Trigger {
        match self {
            Command::Connect => Trigger::Connect,
            Command::LaunchWorld(_) => Trigger::LaunchWorld,
            Command::PrepareVisualization(_) => Trigger::PrepareVisualization,
            Command::RunApplication(_) => Trigger::RunApplication,
            Command::Pause => Trigger::Pause,
            Command::Resume => Trigger::Resume,
            Command::Stop => Trigger::Stop,
            Command::Terminate => Trigger::Terminate,
            Command::Disconnect => Trigger::Disconnect,
        }
    }
}

/// `"console"` or `{"visualization": "console"}`.
fn visualization_profile(data: Option<Value>) -> Result<String> {
    let invalid = |message: &str| ManagerError::InvalidPayload {
        command: "prepare_visualization".to_string(),
        message: message.to_string(),
    };

    let profile = match data {
        Some(Value::String(profile)) => profile,
        Some(Value::Object(map)) => map
            .get("visualization")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| invalid("expected a \"visualization\" string field"))?,
        Some(_) => return Err(invalid("expected a profile name")),
        None => return Err(invalid("missing visualization profile")),
    };

    if profile.trim().is_empty() {
        return Err(invalid("visualization profile must not be empty"));
    }
    Ok(profile)
}
