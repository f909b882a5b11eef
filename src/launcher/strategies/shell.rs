// src/launcher/strategies/shell.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;

use crate::config::LauncherSpec;
use crate::errors::{ManagerError, Result};
use crate::exec::readiness;
use crate::exec::{ExitNotifier, RunnerOptions};
use crate::launcher::strategies::{ProcessSet, expand_vars};
use crate::launcher::{LaunchContext, LaunchFuture, Launcher};

#[derive(Debug, Clone, Deserialize)]
struct ShellParams {
    command: String,
    /// Ready once this TCP port accepts connections.
    #[serde(default)]
    ready_port: Option<u16>,
    /// Ready once this path exists.
    #[serde(default)]
    ready_path: Option<String>,
    /// Ready once a line of `log_file` matches this regex.
    #[serde(default)]
    ready_log_line: Option<String>,
    #[serde(default)]
    log_file: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

/// `type = "command"`: runs `command` through the shell.
///
/// Without a readiness parameter the launcher is ready as soon as the
/// process is alive.
#[derive(Debug)]
pub struct ShellCommandLauncher {
    params: ShellParams,
    ready_log_line: Option<Regex>,
    processes: ProcessSet,
}

impl ShellCommandLauncher {
    pub fn from_spec(spec: &LauncherSpec) -> Result<Box<dyn Launcher>> {
        let params: ShellParams = spec.parameters_as()?;

        if params.ready_log_line.is_some() && params.log_file.is_none() {
            return Err(ManagerError::ConfigError(
                "command launcher: ready_log_line requires log_file".to_string(),
            ));
        }
        let ready_log_line = params
            .ready_log_line
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ManagerError::ConfigError(format!("command launcher: invalid ready_log_line: {e}")))?;

        Ok(Box::new(Self {
            params,
            ready_log_line,
            processes: ProcessSet::default(),
        }))
    }
}

impl Launcher for ShellCommandLauncher {
    fn run<'a>(
        &'a mut self,
        ctx: &'a LaunchContext,
        notifier: ExitNotifier,
    ) -> LaunchFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = notifier.launcher().to_string();
            let mut options = RunnerOptions::new();
            for (key, value) in &self.params.env {
                options = options.env(key.clone(), expand_vars(value));
            }
            let log_file = self.params.log_file.as_deref().map(|f| PathBuf::from(expand_vars(f)));
            if let Some(path) = &log_file {
                options = options.log_file(path.clone());
            }

            self.processes
                .spawn(ctx, &name, expand_vars(&self.params.command), options, &notifier)?;

            let timeout = ctx.launch.probe_timeout;
            if let Some(port) = self.params.ready_port {
                readiness::wait_for_port("127.0.0.1", port, timeout)
                    .await
                    .map_err(|e| e.into_launch_error(&name))?;
            }
            if let Some(path) = &self.params.ready_path {
                readiness::wait_for_path(&PathBuf::from(expand_vars(path)), timeout)
                    .await
                    .map_err(|e| e.into_launch_error(&name))?;
            }
            if let (Some(pattern), Some(path)) = (&self.ready_log_line, &log_file) {
                readiness::wait_for_log_line(path, pattern, timeout)
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
