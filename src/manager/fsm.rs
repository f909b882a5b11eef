// src/manager/fsm.rs

//! Pure lifecycle state machine.
//!
//! No IO and no async: the table below is the whole truth about which
//! trigger is allowed from which state. The [`crate::manager::Manager`]
//! asks [`StateMachine::check`] before running a hook and only calls
//! [`StateMachine::commit`] once the hook succeeded.

use std::fmt;

use serde::Serialize;

use crate::errors::{ManagerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Idle,
    Connected,
    WorldReady,
    VisualizationReady,
    ApplicationRunning,
    Paused,
}

impl State {
    pub const ALL: [State; 6] = [
        State::Idle,
        State::Connected,
        State::WorldReady,
        State::VisualizationReady,
        State::ApplicationRunning,
        State::Paused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Connected => "connected",
            State::WorldReady => "world_ready",
            State::VisualizationReady => "visualization_ready",
            State::ApplicationRunning => "application_running",
            State::Paused => "paused",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trigger {
    Connect,
    LaunchWorld,
    PrepareVisualization,
    RunApplication,
    Pause,
    Resume,
    Stop,
    Terminate,
    Disconnect,
    /// Internal: a supervised launcher process exited on its own.
    LauncherDied,
}

impl Trigger {
    /// Triggers reachable from client commands.
    pub const COMMANDS: [Trigger; 9] = [
        Trigger::Connect,
        Trigger::LaunchWorld,
        Trigger::PrepareVisualization,
        Trigger::RunApplication,
        Trigger::Pause,
        Trigger::Resume,
        Trigger::Stop,
        Trigger::Terminate,
        Trigger::Disconnect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Connect => "connect",
            Trigger::LaunchWorld => "launch_world",
            Trigger::PrepareVisualization => "prepare_visualization",
            Trigger::RunApplication => "run_application",
            Trigger::Pause => "pause",
            Trigger::Resume => "resume",
            Trigger::Stop => "stop",
            Trigger::Terminate => "terminate",
            Trigger::Disconnect => "disconnect",
            Trigger::LauncherDied => "launcher_died",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use State::*;

/// `(trigger, sources, destination)`. An empty source list means "any".
pub const TRANSITIONS: &[(Trigger, &[State], State)] = &[
    (Trigger::Connect, &[Idle], Connected),
    (Trigger::LaunchWorld, &[Connected], WorldReady),
    (Trigger::PrepareVisualization, &[WorldReady], VisualizationReady),
    (Trigger::RunApplication, &[VisualizationReady, Paused], ApplicationRunning),
    (Trigger::Pause, &[ApplicationRunning], Paused),
    (Trigger::Resume, &[Paused], ApplicationRunning),
    (Trigger::Stop, &[ApplicationRunning, Paused], VisualizationReady),
    (Trigger::Terminate, &[WorldReady, ApplicationRunning, Paused], WorldReady),
    (Trigger::Disconnect, &[], Idle),
    (
        Trigger::LauncherDied,
        &[WorldReady, VisualizationReady, ApplicationRunning, Paused],
        Connected,
    ),
];

/// Destination of `trigger` from `from`, or `None` when not allowed.
pub fn next_state(trigger: Trigger, from: State) -> Option<State> {
    TRANSITIONS
        .iter()
        .find(|(t, sources, _)| *t == trigger && (sources.is_empty() || sources.contains(&from)))
        .map(|(_, _, to)| *to)
}

/// Fold a trigger sequence over the table from `start`; disallowed
/// triggers leave the state unchanged.
pub fn fold<I>(start: State, triggers: I) -> State
where
    I: IntoIterator<Item = Trigger>,
{
    triggers
        .into_iter()
        .fold(start, |state, trigger| next_state(trigger, state).unwrap_or(state))
}

/// A transition approved by [`StateMachine::check`], not yet committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub trigger: Trigger,
    pub from: State,
    pub to: State,
}

#[derive(Debug, Clone)]
pub struct StateMachine {
    state: State,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self { state: State::Idle }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn check(&self, trigger: Trigger) -> Result<Transition> {
        next_state(trigger, self.state)
            .map(|to| Transition {
                trigger,
                from: self.state,
                to,
            })
            .ok_or_else(|| ManagerError::InvalidTransition {
                trigger: trigger.to_string(),
                state: self.state.to_string(),
            })
    }

    /// Apply an approved transition. Ignored if the state moved since the
    /// check.
    pub fn commit(&mut self, transition: Transition) -> bool {
        if self.state != transition.from {
            return false;
        }
        self.state = transition.to;
        true
    }
}
