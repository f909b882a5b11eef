// src/launcher/strategies/teleoperator.rs

use serde::Deserialize;

use crate::config::LauncherSpec;
use crate::errors::Result;
use crate::exec::{ExitNotifier, RunnerOptions};
use crate::launcher::strategies::{ProcessSet, accelerated};
use crate::launcher::{LaunchContext, LaunchFuture, Launcher};

const TELEOPERATOR: &str = "/opt/jderobot/utils/model_teleoperator.py";

#[derive(Debug, Clone, Deserialize)]
struct TeleoperatorParams {
    #[serde(alias = "port")]
    model_plugin_port: u16,
}

/// `teleoperator_ros2`: bridges keyboard teleoperation to the model plugin.
#[derive(Debug)]
pub struct TeleoperatorLauncher {
    params: TeleoperatorParams,
    processes: ProcessSet,
}

impl TeleoperatorLauncher {
    pub fn from_spec(spec: &LauncherSpec) -> Result<Box<dyn Launcher>> {
        Ok(Box::new(Self {
            params: spec.parameters_as()?,
            processes: ProcessSet::default(),
        }))
    }
}

impl Launcher for TeleoperatorLauncher {
    fn run<'a>(
        &'a mut self,
        ctx: &'a LaunchContext,
        notifier: ExitNotifier,
    ) -> LaunchFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = notifier.launcher().to_string();
            let (command, options) = accelerated(
                ctx,
                &format!("{TELEOPERATOR} 0.0.0.0 {}", self.params.model_plugin_port),
                RunnerOptions::new(),
            );
            self.processes.spawn(ctx, &name, command, options, &notifier)?;
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
