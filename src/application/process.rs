// src/application/process.rs

use std::time::Duration;

use tracing::{info, warn};

use crate::application::lint::{self, LintContext, Linter};
use crate::application::{AppFuture, Application, CodeSubmission};
use crate::config::ApplicationSection;
use crate::errors::{ManagerError, Result};
use crate::exec::{CommandRunner, ProcessTable, RunnerOptions};
use crate::workspace::Workspace;

/// Runs `<interpreter> <entrypoint> <parameters...>` as a supervised
/// process tree. Pause and resume stop and continue the whole tree.
pub struct ProcessApplication {
    settings: ApplicationSection,
    workspace: Workspace,
    linter: Box<dyn Linter>,
    table: ProcessTable,
    stop_timeout: Duration,
    command: Option<String>,
    runner: Option<CommandRunner>,
}

impl std::fmt::Debug for ProcessApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessApplication")
            .field("command", &self.command)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl ProcessApplication {
    pub fn new(
        settings: ApplicationSection,
        workspace: Workspace,
        linter: Box<dyn Linter>,
        table: ProcessTable,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            settings,
            workspace,
            linter,
            table,
            stop_timeout,
            command: None,
            runner: None,
        }
    }

    pub fn loaded_command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    fn build_command(&self, submission: &CodeSubmission, code_path: &str) -> String {
        let entrypoint = submission
            .entrypoint
            .as_deref()
            .or(self.settings.entrypoint.as_deref())
            .unwrap_or(code_path);

        let parameters = if submission.parameters.is_empty() {
            &self.settings.parameters
        } else {
            &submission.parameters
        };

        let mut parts = vec![self.settings.interpreter.clone(), shell_quote(entrypoint)];
        parts.extend(parameters.iter().map(|p| shell_quote(p)));
        parts.join(" ")
    }

    async fn stop_runner(&mut self) {
        if let Some(mut runner) = self.runner.take() {
            let outcome = runner.stop(libc::SIGKILL, Some(self.stop_timeout)).await;
            info!(
                pid = runner.pid(),
                terminated = outcome.terminated.len(),
                alive = outcome.alive.len(),
                "application stopped"
            );
        }
    }
}

impl Application for ProcessApplication {
    fn load_code<'a>(
        &'a mut self,
        submission: &'a CodeSubmission,
        exercise_id: Option<&'a str>,
    ) -> AppFuture<'a, Result<()>> {
        Box::pin(async move {
            // The live file only changes once the new code passes lint.
            let staged = self.workspace.stage_code(&submission.code)?;
            let context = LintContext {
                code_path: staged,
                exercise_id: exercise_id.map(str::to_string),
            };

            let diagnostics = match self.linter.check(&submission.code, &context).await {
                Ok(diagnostics) => diagnostics,
                Err(e) => {
                    self.workspace.discard_staged();
                    return Err(e);
                }
            };
            if !diagnostics.is_empty() {
                self.workspace.discard_staged();
                warn!(count = diagnostics.len(), "user code rejected by lint");
                return Err(ManagerError::LintFailed(lint::describe(&diagnostics)));
            }

            let code_path = self.workspace.commit_staged()?;
            let command = self.build_command(submission, &code_path.display().to_string());
            info!(cmd = %command, "user code loaded");
            self.command = Some(command);
            Ok(())
        })
    }

    fn run(&mut self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move {
            let command = self
                .command
                .clone()
                .ok_or_else(|| ManagerError::Application("no code loaded".to_string()))?;

            self.stop_runner().await;

            let options = RunnerOptions::new().cwd(self.workspace.root().join("code"));
            let runner = CommandRunner::start("application", command, options, &self.table, None)?;
            info!(pid = runner.pid(), "application started");
            self.runner = Some(runner);
            Ok(())
        })
    }

    fn pause(&mut self) -> Result<()> {
        match &self.runner {
            Some(runner) if runner.is_alive() => {
                runner.signal(libc::SIGSTOP);
                info!(pid = runner.pid(), "application paused");
            }
            _ => warn!("pause requested but the application is not running"),
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        match &self.runner {
            Some(runner) if runner.is_alive() => {
                runner.signal(libc::SIGCONT);
                info!(pid = runner.pid(), "application resumed");
            }
            _ => warn!("resume requested but the application is not running"),
        }
        Ok(())
    }

    fn stop(&mut self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move {
            self.stop_runner().await;
            Ok(())
        })
    }

    fn restart(&mut self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move {
            self.stop_runner().await;
            self.run().await
        })
    }

    fn terminate(&mut self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move {
            self.stop_runner().await;
            self.command = None;
            Ok(())
        })
    }

    fn is_alive(&self) -> bool {
        self.runner.as_ref().is_some_and(CommandRunner::is_alive)
    }
}

fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}
