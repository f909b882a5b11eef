use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// How a launcher entry in a launch payload is interpreted.
///
/// - `Module`: resolve a launcher strategy from the registry by `module`.
/// - `Command`: run `parameters.command` as a raw shell command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LauncherKind {
    Module,
    Command,
}

impl Default for LauncherKind {
    fn default() -> Self {
        LauncherKind::Module
    }
}

impl FromStr for LauncherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "module" => Ok(LauncherKind::Module),
            "command" => Ok(LauncherKind::Command),
            other => Err(format!(
                "invalid launcher type: {other} (expected \"module\" or \"command\")"
            )),
        }
    }
}

/// What the process does once a `disconnect` has torn everything down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectMode {
    /// Re-execute the current binary with the same arguments.
    Exec,
    /// Exit with status 0 and let an outer supervisor restart us.
    Exit,
    /// Stay in `idle` and keep serving commands.
    Stay,
}

impl Default for DisconnectMode {
    fn default() -> Self {
        DisconnectMode::Exec
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

/// `serde(deserialize_with)` adapter for duration strings.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}
