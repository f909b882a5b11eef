// src/manager/mod.rs

//! Lifecycle controller.
//!
//! - [`fsm`] is the pure transition table.
//! - [`command`] turns inbound messages into typed commands.
//! - [`hooks`] holds the side effects run before each transition commits.
//! - [`dispatch`] is the async loop draining the event queue.
//!
//! Everything that mutates the manager goes through the single event queue
//! ([`ManagerEvent`]), so transitions never interleave.

use std::fmt;

use tracing::{debug, info};

use crate::application::Application;
use crate::errors::Result;
use crate::exec::ExitNotice;
use crate::introspection::Introspection;
use crate::launcher::{LaunchPlan, LauncherEngine};
use crate::simulation::WorldControl;
use crate::transport::{InboundMessage, OutboundMessage, Outbox, RelayHandle};

pub mod command;
pub mod dispatch;
pub mod fsm;
pub mod hooks;

pub use command::Command;
pub use dispatch::{DispatchLoop, LoopExit};
pub use fsm::{State, StateMachine, Transition, Trigger};

/// Events consumed by the dispatch loop.
#[derive(Debug)]
pub enum ManagerEvent {
    /// A command frame from the client.
    Command(InboundMessage),

    /// A supervised launcher process exited without being asked to.
    LauncherDied(ExitNotice),

    /// Ctrl-C: tear everything down and leave.
    Shutdown,
}

/// Where the legacy GUI relay listens and which profiles start it.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub host: String,
    pub port: u16,
    pub profiles: Vec<String>,
}

impl RelaySettings {
    pub fn disabled() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            profiles: Vec::new(),
        }
    }

    pub fn wanted_for(&self, profile: &str) -> bool {
        self.profiles.iter().any(|p| p == profile)
    }
}

/// Owns the state machine and everything the hooks act on.
pub struct Manager {
    fsm: StateMachine,
    engine: LauncherEngine,
    plan: Option<LaunchPlan>,
    application: Box<dyn Application>,
    world: Box<dyn WorldControl>,
    outbox: Outbox,
    introspection: Introspection,
    relay_settings: RelaySettings,
    relay: Option<RelayHandle>,
    exercise_id: Option<String>,
    code_loaded: bool,
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("state", &self.fsm.state())
            .field("plan", &self.plan)
            .field("exercise_id", &self.exercise_id)
            .field("code_loaded", &self.code_loaded)
            .finish_non_exhaustive()
    }
}

impl Manager {
    pub fn new(
        engine: LauncherEngine,
        application: Box<dyn Application>,
        world: Box<dyn WorldControl>,
        outbox: Outbox,
        introspection: Introspection,
        relay_settings: RelaySettings,
    ) -> Self {
        Self {
            fsm: StateMachine::new(),
            engine,
            plan: None,
            application,
            world,
            outbox,
            introspection,
            relay_settings,
            relay: None,
            exercise_id: None,
            code_loaded: false,
        }
    }

    pub fn state(&self) -> State {
        self.fsm.state()
    }

    pub fn plan(&self) -> Option<&LaunchPlan> {
        self.plan.as_ref()
    }

    pub fn code_loaded(&self) -> bool {
        self.code_loaded
    }

    pub fn relay_port(&self) -> Option<u16> {
        self.relay.as_ref().map(RelayHandle::port)
    }

    /// Check, run the before-hook, commit. A failing hook leaves the state
    /// where it was and surfaces the error.
    pub async fn apply(&mut self, command: Command) -> Result<Transition> {
        let transition = self.fsm.check(command.trigger())?;
        debug!(trigger = %transition.trigger, from = %transition.from, to = %transition.to, "running hook");

        self.before(transition, command).await?;
        self.commit(transition);
        Ok(transition)
    }

    /// Route a launcher death. Returns the new state, or `None` when the
    /// notice was ignored (stale generation, or nothing launched).
    pub async fn launcher_died(&mut self, notice: ExitNotice) -> Option<State> {
        let current = self.plan.as_ref().map(LaunchPlan::generation);
        if current != Some(notice.generation) {
            debug!(
                launcher = %notice.launcher,
                generation = notice.generation,
                current = ?current,
                "ignoring exit notice from another launch cycle"
            );
            return None;
        }

        let Ok(transition) = self.fsm.check(Trigger::LauncherDied) else {
            debug!(launcher = %notice.launcher, state = %self.state(), "ignoring exit notice");
            return None;
        };

        self.on_launcher_died(&notice).await;
        self.commit(transition);
        Some(transition.to)
    }

    /// Teardown used on Ctrl-C or when the client queue closes.
    pub async fn shutdown(&mut self) {
        if self.state() == State::Idle && self.plan.is_none() {
            return;
        }
        self.release_everything().await;
        if let Ok(transition) = self.fsm.check(Trigger::Disconnect) {
            self.commit(transition);
        }
    }

    fn commit(&mut self, transition: Transition) {
        if self.fsm.commit(transition) {
            info!(trigger = %transition.trigger, from = %transition.from, to = %transition.to, "state changed");
            self.outbox.send(OutboundMessage::state_changed(transition.to.as_str()));
        }
    }
}
