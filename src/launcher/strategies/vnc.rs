// src/launcher/strategies/vnc.rs

//! Browser-reachable desktops: X display + VNC server + noVNC proxy.
//!
//! `console`, `gazebo_view` and `robot_display_view` only differ in their
//! parameters.

use serde::Deserialize;
use tracing::debug;

use crate::config::LauncherSpec;
use crate::errors::Result;
use crate::exec::readiness;
use crate::exec::{ExitNotifier, RunnerOptions};
use crate::launcher::strategies::{ProcessSet, VNC_PORT_TIMEOUT, start_xserver};
use crate::launcher::{LaunchContext, LaunchFuture, Launcher};

#[derive(Debug, Clone, Deserialize)]
struct VncParams {
    display: String,
    internal_port: u16,
    external_port: u16,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    /// Program shown on the display once the VNC stack is up.
    #[serde(default)]
    command: Option<String>,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

#[derive(Debug)]
pub struct VncLauncher {
    surface: &'static str,
    params: VncParams,
    processes: ProcessSet,
}

impl VncLauncher {
    pub fn from_spec(surface: &'static str, spec: &LauncherSpec) -> Result<Box<dyn Launcher>> {
        Ok(Box::new(Self {
            surface,
            params: spec.parameters_as()?,
            processes: ProcessSet::default(),
        }))
    }

    fn novnc_command(&self, ctx: &LaunchContext) -> String {
        let script = if ctx.ros_version() == 2 {
            "/noVNC/utils/novnc_proxy"
        } else {
            "/noVNC/utils/launch.sh"
        };
        format!(
            "{script} --listen {} --vnc localhost:{}",
            self.params.external_port, self.params.internal_port
        )
    }

    async fn start_software(&mut self, ctx: &LaunchContext, name: &str, notifier: &ExitNotifier) -> Result<()> {
        let display = self.params.display.clone();
        start_xserver(&mut self.processes, ctx, name, &display, notifier).await?;

        // Foreground x11vnc: a daemonized one would leave the supervised tree.
        self.processes.spawn(
            ctx,
            &format!("{name}/x11vnc"),
            format!(
                "x11vnc -quiet -display {display} -nopw -forever -xkb -rfbport {}",
                self.params.internal_port
            ),
            RunnerOptions::new(),
            notifier,
        )?;
        Ok(())
    }

    fn start_turbovnc(&mut self, ctx: &LaunchContext, name: &str, notifier: &ExitNotifier, device: &str) -> Result<()> {
        self.processes.spawn(
            ctx,
            &format!("{name}/turbovnc"),
            format!(
                "/opt/TurboVNC/bin/vncserver {} -fg -geometry '{}x{}' -vgl -noreset -SecurityTypes None -rfbport {}",
                self.params.display, self.params.width, self.params.height, self.params.internal_port
            ),
            RunnerOptions::new()
                .env("VGL_DISPLAY", device)
                .env("TVNC_WM", "startlxde"),
            notifier,
        )
    }
}

impl Launcher for VncLauncher {
    fn run<'a>(
        &'a mut self,
        ctx: &'a LaunchContext,
        notifier: ExitNotifier,
    ) -> LaunchFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = notifier.launcher().to_string();
            debug!(launcher = %name, surface = self.surface, display = %self.params.display, "starting VNC surface");

            match ctx.gpu_device.as_ref().map(|d| d.display().to_string()) {
                Some(device) => self.start_turbovnc(ctx, &name, &notifier, &device)?,
                None => self.start_software(ctx, &name, &notifier).await?,
            }

            self.processes.spawn(
                ctx,
                &format!("{name}/novnc"),
                self.novnc_command(ctx),
                RunnerOptions::new(),
                &notifier,
            )?;

            readiness::wait_for_port("127.0.0.1", self.params.internal_port, VNC_PORT_TIMEOUT)
                .await
                .map_err(|e| e.into_launch_error(&name))?;

            if let Some(command) = self.params.command.clone() {
                self.processes.spawn(
                    ctx,
                    &format!("{name}/app"),
                    command,
                    RunnerOptions::new().env("DISPLAY", self.params.display.clone()),
                    &notifier,
                )?;
            }

            self.processes.mark_ready();
            Ok(())
        })
    }

    fn is_running(&self) -> bool {
        self.processes.is_running()
    }

    fn terminate<'a>(&'a mut self, ctx: &'a LaunchContext) -> LaunchFuture<'a, Result<()>> {
        Box::pin(self.processes.terminate(ctx))
    }
}
