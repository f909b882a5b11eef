// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{DisconnectMode, deserialize_duration};

/// Settings of the control process, read from an optional TOML file.
///
/// ```toml
/// [server]
/// on_disconnect = "exec"
///
/// [workspace]
/// root = "/workspace"
///
/// [launch]
/// ros_version = 2
/// poll_interval = "500ms"
/// readiness_timeout = "2m"
///
/// [application]
/// interpreter = "python3"
/// ```
///
/// Every section is optional and has defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSettings {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub workspace: WorkspaceSection,

    #[serde(default)]
    pub launch: LaunchSection,

    #[serde(default)]
    pub visualization: VisualizationSection,

    #[serde(default)]
    pub application: ApplicationSection,

    #[serde(default)]
    pub lint: LintSection,

    #[serde(default)]
    pub simulation: SimulationSection,
}

/// Validated settings. Only obtainable through `Settings::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSection,
    pub workspace: WorkspaceSection,
    pub launch: LaunchSection,
    pub visualization: VisualizationSection,
    pub application: ApplicationSection,
    pub lint: LintSection,
    pub simulation: SimulationSection,
}

impl Settings {
    pub(crate) fn new_unchecked(raw: RawSettings) -> Self {
        Self {
            server: raw.server,
            workspace: raw.workspace,
            launch: raw.launch,
            visualization: raw.visualization,
            application: raw.application,
            lint: raw.lint,
            simulation: raw.simulation,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// What happens after `disconnect` finished tearing down.
    #[serde(default)]
    pub on_disconnect: DisconnectMode,

    /// Capacity of the command queue between transport and dispatch loop.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long Ctrl-C waits for the regular cleanup before killing every
    /// supervised process directly.
    #[serde(
        default = "default_shutdown_grace",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_grace: Duration,
}

fn default_queue_capacity() -> usize {
    64
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(15)
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            on_disconnect: DisconnectMode::default(),
            queue_capacity: default_queue_capacity(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// `[workspace]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceSection {
    /// Root under which `worlds/`, `code/` and `binaries/` are created.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("/workspace")
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

/// `[launch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchSection {
    /// Major ROS version (1 or 2); selects the world launchers.
    #[serde(default = "default_ros_version")]
    pub ros_version: u8,

    /// Interval between `is_running()` polls while waiting for readiness.
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub poll_interval: Duration,

    /// Upper bound for one launcher to become ready. `"0s"` waits forever.
    #[serde(
        default = "default_readiness_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub readiness_timeout: Duration,

    /// Time given to a process tree to exit after SIGKILL.
    #[serde(
        default = "default_stop_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub stop_timeout: Duration,

    /// Timeout of the per-strategy probes (X socket, TCP port, process name).
    #[serde(
        default = "default_probe_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub probe_timeout: Duration,
}

fn default_ros_version() -> u8 {
    std::env::var("ROS_VERSION")
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .unwrap_or(2)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_readiness_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for LaunchSection {
    fn default() -> Self {
        Self {
            ros_version: default_ros_version(),
            poll_interval: default_poll_interval(),
            readiness_timeout: default_readiness_timeout(),
            stop_timeout: default_stop_timeout(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

impl LaunchSection {
    /// Readiness bound, or `None` when waiting is unbounded.
    pub fn readiness_bound(&self) -> Option<Duration> {
        if self.readiness_timeout.is_zero() {
            None
        } else {
            Some(self.readiness_timeout)
        }
    }
}

/// `[visualization]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct VisualizationSection {
    /// Port of the legacy GUI relay listener.
    #[serde(default = "default_relay_port")]
    pub relay_port: u16,

    /// Profiles that start the relay listener.
    #[serde(default = "default_relay_profiles")]
    pub relay_profiles: Vec<String>,
}

fn default_relay_port() -> u16 {
    2303
}

fn default_relay_profiles() -> Vec<String> {
    vec!["gazebo_rae".to_string()]
}

impl Default for VisualizationSection {
    fn default() -> Self {
        Self {
            relay_port: default_relay_port(),
            relay_profiles: default_relay_profiles(),
        }
    }
}

/// `[application]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSection {
    /// Interpreter used to run user code.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Program handed to the interpreter. When unset, the persisted user
    /// code file itself is run.
    #[serde(default)]
    pub entrypoint: Option<String>,

    /// Extra arguments appended after the entrypoint.
    #[serde(default)]
    pub parameters: Vec<String>,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

impl Default for ApplicationSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            entrypoint: None,
            parameters: Vec::new(),
        }
    }
}

/// `[lint]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LintSection {
    /// Shell command run before user code executes. `{file}` and
    /// `{exercise_id}` are substituted. Linting is skipped when unset.
    #[serde(default)]
    pub command: Option<String>,

    /// Regex selecting the output lines that block execution.
    #[serde(default = "default_error_pattern")]
    pub error_pattern: String,
}

fn default_error_pattern() -> String {
    r":\d+: error".to_string()
}

impl Default for LintSection {
    fn default() -> Self {
        Self {
            command: None,
            error_pattern: default_error_pattern(),
        }
    }
}

/// `[simulation]` section: commands controlling simulated time.
///
/// Unset commands fall back to the Gazebo services for the configured
/// ROS version.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SimulationSection {
    #[serde(default)]
    pub pause_command: Option<String>,

    #[serde(default)]
    pub unpause_command: Option<String>,

    #[serde(default)]
    pub reset_command: Option<String>,
}
