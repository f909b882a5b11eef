// src/launcher/strategies/ros.rs

//! Gazebo worlds started through a ROS launch file.

use serde::Deserialize;

use crate::config::LauncherSpec;
use crate::errors::Result;
use crate::exec::readiness;
use crate::exec::{ExitNotifier, RunnerOptions};
use crate::launcher::strategies::{ProcessSet, accelerated, expand_vars, gazebo_env, start_xserver};
use crate::launcher::{LaunchContext, LaunchFuture, Launcher};

const WORLD_DISPLAY: &str = ":0";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WorldParams {
    pub(crate) launch_file: String,
    #[serde(default)]
    pub(crate) resource_folders: Vec<String>,
    #[serde(default)]
    pub(crate) model_folders: Vec<String>,
    #[serde(default)]
    pub(crate) plugin_folders: Vec<String>,
}

impl WorldParams {
    pub(crate) fn runner_options(&self) -> RunnerOptions {
        let mut options = RunnerOptions::new().env("DISPLAY", WORLD_DISPLAY);
        for (key, value) in gazebo_env(&self.resource_folders, &self.model_folders, &self.plugin_folders) {
            options = options.env(key, value);
        }
        options
    }
}

/// ROS 1 world: dummy X server, `roslaunch`, then waits for `rosmaster`
/// and `gzserver` to appear.
#[derive(Debug)]
pub struct RosApiLauncher {
    params: WorldParams,
    processes: ProcessSet,
}

impl RosApiLauncher {
    pub fn from_spec(spec: &LauncherSpec) -> Result<Box<dyn Launcher>> {
        Ok(Box::new(Self {
            params: spec.parameters_as()?,
            processes: ProcessSet::default(),
        }))
    }
}

impl Launcher for RosApiLauncher {
    fn run<'a>(
        &'a mut self,
        ctx: &'a LaunchContext,
        notifier: ExitNotifier,
    ) -> LaunchFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = notifier.launcher().to_string();
            start_xserver(&mut self.processes, ctx, &name, WORLD_DISPLAY, &notifier).await?;

            let launch_file = expand_vars(&self.params.launch_file);
            self.processes.spawn(
                ctx,
                &format!("{name}/roslaunch"),
                format!("roslaunch {launch_file}"),
                self.params.runner_options(),
                &notifier,
            )?;

            for process in ["rosmaster", "gzserver"] {
                readiness::wait_for_process(process, ctx.launch.probe_timeout)
                    .await
                    .map_err(|e| e.into_launch_error(&name))?;
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

/// ROS 2 world: `ros2 launch <file>`, on the dummy X server unless the
/// robot is physical.
#[derive(Debug)]
pub struct Ros2ApiLauncher {
    params: WorldParams,
    with_display: bool,
    processes: ProcessSet,
}

impl Ros2ApiLauncher {
    pub fn from_spec(spec: &LauncherSpec) -> Result<Box<dyn Launcher>> {
        Self::build(spec, true)
    }

    /// `ros2_api_phy`: no simulator, so no X server.
    pub fn physical_from_spec(spec: &LauncherSpec) -> Result<Box<dyn Launcher>> {
        Self::build(spec, false)
    }

    fn build(spec: &LauncherSpec, with_display: bool) -> Result<Box<dyn Launcher>> {
        Ok(Box::new(Self {
            params: spec.parameters_as()?,
            with_display,
            processes: ProcessSet::default(),
        }))
    }
}

impl Launcher for Ros2ApiLauncher {
    fn run<'a>(
        &'a mut self,
        ctx: &'a LaunchContext,
        notifier: ExitNotifier,
    ) -> LaunchFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = notifier.launcher().to_string();
            if self.with_display {
                start_xserver(&mut self.processes, ctx, &name, WORLD_DISPLAY, &notifier).await?;
            }

            let launch_file = expand_vars(&self.params.launch_file);
            let (command, options) = accelerated(
                ctx,
                &format!("ros2 launch {launch_file}"),
                self.params.runner_options(),
            );
            self.processes
                .spawn(ctx, &format!("{name}/ros2-launch"), command, options, &notifier)?;

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
