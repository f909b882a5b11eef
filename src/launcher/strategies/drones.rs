// src/launcher/strategies/drones.rs

use crate::config::LauncherSpec;
use crate::errors::Result;
use crate::exec::{ExitNotifier, RunnerOptions};
use crate::launcher::strategies::ros::WorldParams;
use crate::launcher::strategies::{ProcessSet, expand_vars, start_xserver};
use crate::launcher::{LaunchContext, LaunchFuture, Launcher};

/// ROS 1 drones: the launch file is a Python script.
#[derive(Debug)]
pub struct DronesLauncher {
    params: WorldParams,
    processes: ProcessSet,
}

impl DronesLauncher {
    pub fn from_spec(spec: &LauncherSpec) -> Result<Box<dyn Launcher>> {
        Ok(Box::new(Self {
            params: spec.parameters_as()?,
            processes: ProcessSet::default(),
        }))
    }
}

impl Launcher for DronesLauncher {
    fn run<'a>(
        &'a mut self,
        ctx: &'a LaunchContext,
        notifier: ExitNotifier,
    ) -> LaunchFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = notifier.launcher().to_string();
            let launch_file = expand_vars(&self.params.launch_file);
            self.processes.spawn(
                ctx,
                &format!("{name}/python"),
                format!("python3 {launch_file}"),
                RunnerOptions::new(),
                &notifier,
            )?;
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

/// ROS 2 drones: Aerostack2 nodes plus the PX4/gzserver run script, both
/// on the dummy X server.
#[derive(Debug)]
pub struct DronesRos2Launcher {
    params: WorldParams,
    processes: ProcessSet,
}

impl DronesRos2Launcher {
    pub fn from_spec(spec: &LauncherSpec) -> Result<Box<dyn Launcher>> {
        Ok(Box::new(Self {
            params: spec.parameters_as()?,
            processes: ProcessSet::default(),
        }))
    }
}

impl Launcher for DronesRos2Launcher {
    fn run<'a>(
        &'a mut self,
        ctx: &'a LaunchContext,
        notifier: ExitNotifier,
    ) -> LaunchFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = notifier.launcher().to_string();
            start_xserver(&mut self.processes, ctx, &name, ":0", &notifier).await?;

            let world_file = expand_vars(&self.params.launch_file);
            self.processes.spawn(
                ctx,
                &format!("{name}/aerostack2"),
                format!(
                    "ros2 launch jderobot_drones as2_default_classic_gazebo.launch.py world_file:={world_file}"
                ),
                self.params.runner_options(),
                &notifier,
            )?;
            self.processes.spawn(
                ctx,
                &format!("{name}/px4"),
                format!("$AS2_GZ_ASSETS_SCRIPT_PATH/default_run.sh {world_file}"),
                self.params.runner_options(),
                &notifier,
            )?;

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
