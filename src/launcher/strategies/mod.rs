// src/launcher/strategies/mod.rs

//! Built-in launcher strategies and the helpers they share.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use tracing::debug;

use crate::errors::Result;
use crate::exec::readiness;
use crate::exec::{CommandRunner, ExitNotifier, RunnerOptions};
use crate::launcher::{LaunchContext, LauncherRegistry};

pub mod drones;
pub mod ros;
pub mod shell;
pub mod teleoperator;
pub mod vnc;
pub mod xserver;

pub use drones::{DronesLauncher, DronesRos2Launcher};
pub use ros::{Ros2ApiLauncher, RosApiLauncher};
pub use shell::ShellCommandLauncher;
pub use teleoperator::TeleoperatorLauncher;
pub use vnc::VncLauncher;
pub use xserver::XserverLauncher;

/// Module name `type = "command"` specs resolve to.
pub const COMMAND_MODULE: &str = "command";

const XORG_CONFIG: &str = "./xorg.conf";

/// Register every built-in strategy.
pub fn register_builtin(registry: &mut LauncherRegistry) {
    registry
        .register(COMMAND_MODULE, ShellCommandLauncher::from_spec)
        .register("ros_api", RosApiLauncher::from_spec)
        .register("ros2_api", Ros2ApiLauncher::from_spec)
        .register("ros2_api_phy", Ros2ApiLauncher::physical_from_spec)
        .register("drones", DronesLauncher::from_spec)
        .register("drones_ros2", DronesRos2Launcher::from_spec)
        .register("gazebo_xserver", XserverLauncher::from_spec)
        .register("teleoperator_ros2", TeleoperatorLauncher::from_spec)
        .register("console", |spec| VncLauncher::from_spec("console", spec))
        .register("gazebo_view", |spec| VncLauncher::from_spec("gazebo_view", spec))
        .register("robot_display_view", |spec| {
            VncLauncher::from_spec("robot_display_view", spec)
        });
}

/// Runners owned by one launcher instance, plus whether the launcher has
/// finished starting them.
#[derive(Debug, Default)]
pub(crate) struct ProcessSet {
    runners: Vec<CommandRunner>,
    ready: bool,
}

impl ProcessSet {
    pub(crate) fn spawn(
        &mut self,
        ctx: &LaunchContext,
        name: &str,
        command: impl Into<String>,
        options: RunnerOptions,
        notifier: &ExitNotifier,
    ) -> Result<()> {
        let runner = CommandRunner::start(name, command, options, &ctx.table, Some(notifier.clone()))?;
        self.runners.push(runner);
        Ok(())
    }

    /// Called at the end of a successful `run`.
    pub(crate) fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Ready, at least one process started, and none has exited.
    pub(crate) fn is_running(&self) -> bool {
        self.ready && !self.runners.is_empty() && self.runners.iter().all(CommandRunner::is_alive)
    }

    /// `Launcher::terminate` for launchers whose only resources are their
    /// processes.
    pub(crate) async fn terminate(&mut self, ctx: &LaunchContext) -> Result<()> {
        self.ready = false;
        self.stop_all(ctx).await;
        Ok(())
    }

    /// Kill every tree, newest first.
    pub(crate) async fn stop_all(&mut self, ctx: &LaunchContext) {
        let timeout = Some(ctx.launch.stop_timeout);
        while let Some(mut runner) = self.runners.pop() {
            let outcome = runner.stop(libc::SIGKILL, timeout).await;
            debug!(
                process = %runner.name(),
                terminated = outcome.terminated.len(),
                alive = outcome.alive.len(),
                "stopped launcher process"
            );
        }
    }
}

/// Expand `$VAR` and `${VAR}` from the environment. Unknown variables are
/// left as written.
pub(crate) fn expand_vars(input: &str) -> String {
    static VAR: LazyLock<Option<Regex>> =
        LazyLock::new(|| Regex::new(r"\$\{(\w+)\}|\$(\w+)").ok());

    let Some(re) = VAR.as_ref() else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

/// Prefix with `vglrun` and point VirtualGL at the DRI device when the
/// host has GPU acceleration.
pub(crate) fn accelerated(ctx: &LaunchContext, command: &str, options: RunnerOptions) -> (String, RunnerOptions) {
    match &ctx.gpu_device {
        Some(device) => (
            format!("vglrun {command}"),
            options.env("VGL_DISPLAY", device.display().to_string()),
        ),
        None => (command.to_string(), options),
    }
}

/// Socket an X server on `display` listens on (`:1` → `/tmp/.X11-unix/X1`).
pub(crate) fn display_socket(display: &str) -> PathBuf {
    let number = display
        .trim_start_matches(':')
        .split('.')
        .next()
        .unwrap_or("0");
    PathBuf::from(format!("/tmp/.X11-unix/X{number}"))
}

pub(crate) fn xserver_command(ctx: &LaunchContext, display: &str) -> String {
    let number = display.trim_start_matches(':');
    let log = ctx.log_dir.join(format!("xdummy{number}.log"));
    format!(
        "/usr/bin/Xorg -quiet -noreset +extension GLX +extension RANDR +extension RENDER -logfile {} -config {XORG_CONFIG} {display}",
        log.display()
    )
}

/// Start a dummy X server on `display` and wait for its socket.
pub(crate) async fn start_xserver(
    set: &mut ProcessSet,
    ctx: &LaunchContext,
    launcher: &str,
    display: &str,
    notifier: &ExitNotifier,
) -> Result<()> {
    set.spawn(
        ctx,
        &format!("{launcher}/xorg{display}"),
        xserver_command(ctx, display),
        RunnerOptions::new(),
        notifier,
    )?;
    readiness::wait_for_path(&display_socket(display), ctx.launch.probe_timeout)
        .await
        .map_err(|e| e.into_launch_error(launcher))
}

/// Gazebo search path variables with the given folders appended.
pub(crate) fn gazebo_env(
    resource_folders: &[String],
    model_folders: &[String],
    plugin_folders: &[String],
) -> Vec<(String, String)> {
    [
        ("GAZEBO_RESOURCE_PATH", resource_folders),
        ("GAZEBO_MODEL_PATH", model_folders),
        ("GAZEBO_PLUGIN_PATH", plugin_folders),
    ]
    .into_iter()
    .filter(|(_, folders)| !folders.is_empty())
    .map(|(var, folders)| {
        let appended: Vec<String> = folders.iter().map(|f| expand_vars(f)).collect();
        let existing = std::env::var(var).unwrap_or_default();
        (var.to_string(), format!("{existing}:{}", appended.join(":")))
    })
    .collect()
}

pub(crate) const VNC_PORT_TIMEOUT: Duration = Duration::from_secs(20);
