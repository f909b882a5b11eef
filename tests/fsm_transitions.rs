// tests/fsm_transitions.rs

use proptest::prelude::*;

use sandbox_manager::errors::ManagerError;
use sandbox_manager::manager::fsm::{self, State, StateMachine, Trigger, next_state};

#[test]
fn happy_path_walks_the_whole_lifecycle() {
    let end = fsm::fold(
        State::Idle,
        [
            Trigger::Connect,
            Trigger::LaunchWorld,
            Trigger::PrepareVisualization,
            Trigger::RunApplication,
            Trigger::Pause,
            Trigger::RunApplication,
            Trigger::Stop,
        ],
    );
    assert_eq!(end, State::VisualizationReady);
}

#[test]
fn terminate_goes_back_to_world_ready() {
    for from in [State::WorldReady, State::ApplicationRunning, State::Paused] {
        assert_eq!(next_state(Trigger::Terminate, from), Some(State::WorldReady));
    }
    assert_eq!(next_state(Trigger::Terminate, State::VisualizationReady), None);
}

#[test]
fn disconnect_is_accepted_everywhere() {
    for from in State::ALL {
        assert_eq!(next_state(Trigger::Disconnect, from), Some(State::Idle));
    }
}

#[test]
fn launcher_death_only_matters_once_something_was_launched() {
    assert_eq!(next_state(Trigger::LauncherDied, State::Idle), None);
    assert_eq!(next_state(Trigger::LauncherDied, State::Connected), None);
    for from in [
        State::WorldReady,
        State::VisualizationReady,
        State::ApplicationRunning,
        State::Paused,
    ] {
        assert_eq!(next_state(Trigger::LauncherDied, from), Some(State::Connected));
    }
}

#[test]
fn rejected_check_reports_trigger_and_state() {
    let machine = StateMachine::new();
    match machine.check(Trigger::Pause) {
        Err(ManagerError::InvalidTransition { trigger, state }) => {
            assert_eq!(trigger, "pause");
            assert_eq!(state, "idle");
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
    assert_eq!(machine.state(), State::Idle);
}

#[test]
fn stale_commit_is_ignored() {
    let mut machine = StateMachine::new();
    let connect = machine.check(Trigger::Connect).unwrap();
    assert!(machine.commit(connect));
    assert!(!machine.commit(connect));
    assert_eq!(machine.state(), State::Connected);
}

#[test]
fn states_render_as_wire_names() {
    let names: Vec<_> = State::ALL.iter().map(State::to_string).collect();
    assert_eq!(
        names,
        [
            "idle",
            "connected",
            "world_ready",
            "visualization_ready",
            "application_running",
            "paused"
        ]
    );
}

fn any_trigger() -> impl Strategy<Value = Trigger> {
    prop_oneof![
        Just(Trigger::Connect),
        Just(Trigger::LaunchWorld),
        Just(Trigger::PrepareVisualization),
        Just(Trigger::RunApplication),
        Just(Trigger::Pause),
        Just(Trigger::Resume),
        Just(Trigger::Stop),
        Just(Trigger::Terminate),
        Just(Trigger::Disconnect),
        Just(Trigger::LauncherDied),
    ]
}

proptest! {
    /// Driving the machine with check/commit lands where folding the table
    /// lands, and a rejected trigger never moves the state.
    #[test]
    fn machine_agrees_with_table_fold(triggers in proptest::collection::vec(any_trigger(), 0..40)) {
        let mut machine = StateMachine::new();
        for trigger in &triggers {
            let before = machine.state();
            match machine.check(*trigger) {
                Ok(transition) => {
                    prop_assert_eq!(transition.from, before);
                    prop_assert!(machine.commit(transition));
                }
                Err(_) => {
                    prop_assert_eq!(machine.state(), before);
                }
            }
        }
        prop_assert_eq!(machine.state(), fsm::fold(State::Idle, triggers));
    }

    #[test]
    fn disconnect_always_ends_idle(triggers in proptest::collection::vec(any_trigger(), 0..40)) {
        let mut all = triggers;
        all.push(Trigger::Disconnect);
        prop_assert_eq!(fsm::fold(State::Idle, all), State::Idle);
    }

    /// Paused is only reachable through application_running.
    #[test]
    fn paused_requires_a_running_application(triggers in proptest::collection::vec(any_trigger(), 1..40)) {
        let mut state = State::Idle;
        for trigger in triggers {
            let next = next_state(trigger, state).unwrap_or(state);
            if next == State::Paused && state != State::Paused {
                prop_assert_eq!(state, State::ApplicationRunning);
            }
            state = next;
        }
    }
}
