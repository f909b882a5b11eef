// src/launcher/strategies/xserver.rs

use serde::Deserialize;

use crate::config::LauncherSpec;
use crate::errors::Result;
use crate::exec::ExitNotifier;
use crate::launcher::strategies::{ProcessSet, start_xserver};
use crate::launcher::{LaunchContext, LaunchFuture, Launcher};

#[derive(Debug, Clone, Deserialize)]
struct XserverParams {
    #[serde(default = "default_display")]
    display: String,
}

fn default_display() -> String {
    ":0".to_string()
}

/// `gazebo_xserver`: a bare dummy X server for other launchers to draw on.
#[derive(Debug)]
pub struct XserverLauncher {
    params: XserverParams,
    processes: ProcessSet,
}

impl XserverLauncher {
    pub fn from_spec(spec: &LauncherSpec) -> Result<Box<dyn Launcher>> {
        Ok(Box::new(Self {
            params: spec.parameters_as()?,
            processes: ProcessSet::default(),
        }))
    }
}

impl Launcher for XserverLauncher {
    fn run<'a>(
        &'a mut self,
        ctx: &'a LaunchContext,
        notifier: ExitNotifier,
    ) -> LaunchFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = notifier.launcher().to_string();
            start_xserver(&mut self.processes, ctx, &name, &self.params.display, &notifier).await?;
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
