// src/manager/hooks.rs

//! Side effects run before a transition commits.
//!
//! A hook that returns an error aborts its transition. Simulation control
//! failures are logged only: a world without physics services must not
//! block the application lifecycle.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::application::CodeSubmission;
use crate::config::LaunchConfiguration;
use crate::errors::{ManagerError, Result};
use crate::exec::ExitNotice;
use crate::launcher::Stage;
use crate::manager::fsm::{State, Transition};
use crate::manager::{Command, Manager};
use crate::transport::{OutboundMessage, start_relay};

impl Manager {
    pub(super) async fn before(&mut self, transition: Transition, command: Command) -> Result<()> {
        match command {
            Command::Connect => {
                self.outbox
                    .send(OutboundMessage::introspection(&self.introspection));
                Ok(())
            }
            Command::LaunchWorld(config) => self.on_launch_world(config).await,
            Command::PrepareVisualization(profile) => self.on_prepare_visualization(&profile).await,
            Command::RunApplication(submission) => {
                self.on_run_application(transition.from, submission).await
            }
            Command::Pause => self.on_pause().await,
            Command::Resume => self.on_resume().await,
            Command::Stop => self.on_stop().await,
            Command::Terminate => self.application.stop().await,
            Command::Disconnect => {
                self.release_everything().await;
                Ok(())
            }
        }
    }

    async fn on_launch_world(&mut self, config: LaunchConfiguration) -> Result<()> {
        // Leftovers of a launch that failed half way.
        if let Some(mut stale) = self.plan.take() {
            info!(generation = stale.generation(), "tearing down previous launch attempt");
            self.engine.terminate(&mut stale).await;
        }

        let plan = self.engine.plan(&config)?;
        info!(
            world = %config.world,
            exercise = %config.exercise_id,
            generation = plan.generation(),
            "launching world"
        );
        self.exercise_id = Some(config.exercise_id.clone());

        let plan = self.plan.insert(plan);
        self.engine.run_stage(plan, Stage::World).await?;
        self.engine.run_stage(plan, Stage::Keyed).await?;
        Ok(())
    }

    async fn on_prepare_visualization(&mut self, profile: &str) -> Result<()> {
        let Some(plan) = self.plan.as_mut() else {
            return Err(ManagerError::ConfigError(
                "no world launched; cannot prepare visualization".to_string(),
            ));
        };

        self.engine.clear_stage(plan, Stage::Visualization).await;
        self.engine.add_visualization(plan, profile)?;
        info!(profile, generation = plan.generation(), "preparing visualization");
        self.engine.run_stage(plan, Stage::Visualization).await?;

        if self.relay_settings.wanted_for(profile) {
            if self.relay.is_none() {
                let handle = start_relay(
                    &self.relay_settings.host,
                    self.relay_settings.port,
                    self.outbox.clone(),
                )
                .await?;
                self.relay = Some(handle);
            }
        } else if let Some(relay) = self.relay.take() {
            relay.stop().await;
        }
        Ok(())
    }

    async fn on_run_application(
        &mut self,
        from: State,
        submission: Option<CodeSubmission>,
    ) -> Result<()> {
        match (from, submission) {
            (State::Paused, None) => {
                self.application.resume()?;
            }
            (_, Some(submission)) => {
                // A failed lint keeps the current program (if any) untouched.
                self.application
                    .load_code(&submission, self.exercise_id.as_deref())
                    .await?;
                self.code_loaded = true;
                self.application.run().await?;
            }
            (_, None) if self.code_loaded => {
                self.application.run().await?;
            }
            (_, None) => {
                return Err(ManagerError::InvalidPayload {
                    command: "run_application".to_string(),
                    message: "no code submitted and none loaded".to_string(),
                });
            }
        }

        if let Err(e) = self.world.unpause().await {
            warn!(error = %e, "could not unpause simulation");
        }
        Ok(())
    }

    async fn on_pause(&mut self) -> Result<()> {
        self.application.pause()?;
        if let Err(e) = self.world.pause().await {
            warn!(error = %e, "could not pause simulation");
        }
        Ok(())
    }

    async fn on_resume(&mut self) -> Result<()> {
        self.application.resume()?;
        if let Err(e) = self.world.unpause().await {
            warn!(error = %e, "could not unpause simulation");
        }
        Ok(())
    }

    async fn on_stop(&mut self) -> Result<()> {
        self.application.stop().await?;
        if let Err(e) = self.world.pause().await {
            warn!(error = %e, "could not pause simulation");
        }
        if let Err(e) = self.world.reset().await {
            warn!(error = %e, "could not reset simulation");
        }
        Ok(())
    }

    pub(super) async fn on_launcher_died(&mut self, notice: &ExitNotice) {
        warn!(
            launcher = %notice.launcher,
            pid = notice.pid,
            exit_code = ?notice.exit_code,
            generation = notice.generation,
            "launcher died; tearing down"
        );
        self.outbox.send(OutboundMessage::update(json!({
            "event": "launcher_died",
            "launcher": notice.launcher,
            "exit_code": notice.exit_code,
        })));
        self.release_everything().await;
    }

    /// Kill the application, the relay and every launcher of the plan.
    /// Never fails; problems are logged.
    pub(super) async fn release_everything(&mut self) {
        if let Err(e) = self.application.terminate().await {
            warn!(error = %e, "application termination failed; continuing teardown");
        }
        self.code_loaded = false;

        if let Some(relay) = self.relay.take() {
            relay.stop().await;
        }

        if let Some(mut plan) = self.plan.take() {
            self.engine.terminate(&mut plan).await;
        }
        self.exercise_id = None;
        debug!("all launchers and application released");
    }
}
