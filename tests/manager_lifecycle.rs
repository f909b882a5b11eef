// tests/manager_lifecycle.rs

mod common;

use sandbox_manager::application::CodeSubmission;
use sandbox_manager::errors::ManagerError;
use sandbox_manager::exec::ExitNotice;
use sandbox_manager::manager::{Command, Manager, ManagerEvent, State};

use crate::common::builders::{FAKE_PROFILE, FAKE_WORLD, LaunchConfigBuilder, fake_catalog};
use crate::common::fakes::{FakeApplication, FakeWorldControl, Journal, fake_registry, fake_spec};
use crate::common::{Harness, init_tracing, with_timeout};

fn launch() -> Command {
    Command::LaunchWorld(
        LaunchConfigBuilder::new(FAKE_WORLD)
            .launcher("0", fake_spec("bridge"))
            .build(),
    )
}

fn run_code(code: &str) -> Command {
    Command::RunApplication(Some(CodeSubmission::new(code)))
}

async fn drive(manager: &mut Manager, commands: Vec<Command>) {
    for command in commands {
        let trigger = command.trigger();
        with_timeout(manager.apply(command))
            .await
            .unwrap_or_else(|e| panic!("{trigger} failed: {e}"));
    }
}

async fn to_running(manager: &mut Manager) {
    drive(
        manager,
        vec![
            Command::Connect,
            launch(),
            Command::PrepareVisualization(FAKE_PROFILE.to_string()),
            run_code("print('hi')"),
        ],
    )
    .await;
    assert_eq!(manager.state(), State::ApplicationRunning);
}

#[tokio::test]
async fn full_lifecycle_drives_launchers_application_and_world() {
    init_tracing();
    let mut h = Harness::new();

    to_running(&mut h.manager).await;
    assert!(h.manager.code_loaded());
    assert_eq!(
        h.journal.entries(),
        [
            "run:world",
            "run:bridge",
            "run:view",
            "app:load:test_exercise",
            "app:run",
            "world:unpause",
        ]
    );

    h.journal.clear();
    drive(&mut h.manager, vec![Command::Pause, Command::Resume, Command::Stop]).await;
    assert_eq!(h.manager.state(), State::VisualizationReady);
    assert_eq!(
        h.journal.entries(),
        [
            "app:pause",
            "world:pause",
            "app:resume",
            "world:unpause",
            "app:stop",
            "world:pause",
            "world:reset",
        ]
    );

    // Code survives `stop`; running again without a payload reuses it.
    h.journal.clear();
    drive(&mut h.manager, vec![Command::RunApplication(None)]).await;
    assert_eq!(h.journal.entries(), ["app:run", "world:unpause"]);

    h.journal.clear();
    drive(&mut h.manager, vec![Command::Disconnect]).await;
    assert_eq!(h.manager.state(), State::Idle);
    assert!(h.manager.plan().is_none());
    assert!(!h.manager.code_loaded());
    assert_eq!(
        h.journal.entries(),
        ["app:terminate", "terminate:view", "terminate:bridge", "terminate:world"]
    );
}

#[tokio::test]
async fn every_commit_emits_state_changed() {
    let mut h = Harness::new();
    to_running(&mut h.manager).await;

    let messages = h.drain_outbound();
    let commands: Vec<_> = messages.iter().map(|m| m.command.as_str()).collect();
    assert_eq!(
        commands,
        ["introspection", "state-changed", "state-changed", "state-changed", "state-changed"]
    );
    let states: Vec<_> = messages
        .iter()
        .filter(|m| m.command == "state-changed")
        .map(|m| m.data["state"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        states,
        ["connected", "world_ready", "visualization_ready", "application_running"]
    );
}

#[tokio::test]
async fn invalid_transition_has_no_side_effects() {
    let mut h = Harness::new();

    let err = h.manager.apply(Command::Pause).await.unwrap_err();
    assert!(matches!(err, ManagerError::InvalidTransition { .. }));
    let err = h.manager.apply(launch()).await.unwrap_err();
    assert!(matches!(err, ManagerError::InvalidTransition { .. }));

    assert_eq!(h.manager.state(), State::Idle);
    assert!(h.journal.entries().is_empty());
    assert!(h.drain_outbound().is_empty());
}

#[tokio::test]
async fn lint_failure_keeps_visualization_ready() {
    let journal = Journal::new();
    let mut h = Harness::with_parts(
        fake_catalog(),
        fake_registry(&journal),
        FakeApplication::new(journal.clone()).failing_lint(),
        FakeWorldControl::new(journal.clone()),
        journal,
    );
    drive(
        &mut h.manager,
        vec![
            Command::Connect,
            launch(),
            Command::PrepareVisualization(FAKE_PROFILE.to_string()),
        ],
    )
    .await;

    let err = h.manager.apply(run_code("syntax error(")).await.unwrap_err();
    assert_eq!(err.code(), "lint");
    assert_eq!(h.manager.state(), State::VisualizationReady);
    assert!(!h.manager.code_loaded());
    assert!(h.journal.with_prefix("app:run").is_empty());
}

#[tokio::test]
async fn run_without_code_is_rejected_until_code_was_loaded() {
    let mut h = Harness::new();
    drive(
        &mut h.manager,
        vec![
            Command::Connect,
            launch(),
            Command::PrepareVisualization(FAKE_PROFILE.to_string()),
        ],
    )
    .await;

    let err = h.manager.apply(Command::RunApplication(None)).await.unwrap_err();
    assert_eq!(err.code(), "invalid_payload");
    assert_eq!(h.manager.state(), State::VisualizationReady);
}

#[tokio::test]
async fn run_from_paused_resumes_or_reloads() {
    let mut h = Harness::new();
    to_running(&mut h.manager).await;
    drive(&mut h.manager, vec![Command::Pause]).await;

    h.journal.clear();
    drive(&mut h.manager, vec![Command::RunApplication(None)]).await;
    assert_eq!(h.journal.entries(), ["app:resume", "world:unpause"]);

    drive(&mut h.manager, vec![Command::Pause]).await;
    h.journal.clear();
    drive(&mut h.manager, vec![run_code("print('v2')")]).await;
    assert_eq!(
        h.journal.entries(),
        ["app:load:test_exercise", "app:run", "world:unpause"]
    );
    assert_eq!(h.manager.state(), State::ApplicationRunning);
}

#[tokio::test]
async fn terminate_keeps_world_and_visualization() {
    let mut h = Harness::new();
    to_running(&mut h.manager).await;

    h.journal.clear();
    drive(&mut h.manager, vec![Command::Terminate]).await;
    assert_eq!(h.manager.state(), State::WorldReady);
    assert_eq!(h.journal.entries(), ["app:stop"]);

    // Preparing again replaces the running visualization.
    h.journal.clear();
    drive(&mut h.manager, vec![Command::PrepareVisualization(FAKE_PROFILE.to_string())]).await;
    assert_eq!(h.journal.entries(), ["terminate:view", "run:view"]);
}

#[tokio::test]
async fn failed_launch_stays_connected_and_is_cleaned_up_on_retry() {
    let mut h = Harness::new();
    drive(&mut h.manager, vec![Command::Connect]).await;

    let broken = Command::LaunchWorld(
        LaunchConfigBuilder::new(FAKE_WORLD)
            .launcher("0", fake_spec("bridge").with_param("fail_run", true))
            .build(),
    );
    let err = h.manager.apply(broken).await.unwrap_err();
    assert_eq!(err.code(), "launcher");
    assert_eq!(h.manager.state(), State::Connected);
    assert!(h.manager.plan().is_some());

    h.journal.clear();
    drive(&mut h.manager, vec![launch()]).await;
    assert_eq!(h.manager.state(), State::WorldReady);
    assert_eq!(
        h.journal.entries(),
        ["terminate:bridge", "terminate:world", "run:world", "run:bridge"]
    );
}

#[tokio::test]
async fn launcher_death_is_routed_exactly_once() {
    init_tracing();
    let mut h = Harness::new();
    to_running(&mut h.manager).await;
    let generation = h.manager.plan().unwrap().generation();

    // Two processes of the same cycle die; only the first one counts.
    let notifier = h.journal.notifier("bridge").unwrap();
    notifier.notify(4242, Some(1)).await;
    notifier.for_launcher("view").notify(4343, None).await;

    for _ in 0..2 {
        let Some(ManagerEvent::LauncherDied(notice)) = h.events_rx.recv().await else {
            panic!("expected a launcher death");
        };
        assert_eq!(notice.generation, generation);
        h.manager.launcher_died(notice).await;
    }

    assert_eq!(h.manager.state(), State::Connected);
    assert!(h.manager.plan().is_none());
    let changes: Vec<_> = h
        .drain_outbound()
        .into_iter()
        .filter(|m| m.command == "state-changed" && m.data["state"] == "connected")
        .collect();
    assert_eq!(changes.len(), 2, "connect plus exactly one death");
}

#[tokio::test]
async fn stale_or_early_deaths_are_ignored() {
    let mut h = Harness::new();

    let early = ExitNotice {
        launcher: "world".to_string(),
        generation: 1,
        pid: 1,
        exit_code: Some(0),
    };
    assert_eq!(h.manager.launcher_died(early).await, None);

    to_running(&mut h.manager).await;
    let generation = h.manager.plan().unwrap().generation();
    let stale = ExitNotice {
        launcher: "world".to_string(),
        generation: generation - 1,
        pid: 1,
        exit_code: Some(0),
    };
    assert_eq!(h.manager.launcher_died(stale).await, None);
    assert_eq!(h.manager.state(), State::ApplicationRunning);
}

#[tokio::test]
async fn disconnect_from_every_state_releases_everything() {
    let setups: Vec<Vec<Command>> = vec![
        vec![],
        vec![Command::Connect],
        vec![Command::Connect, launch()],
        vec![
            Command::Connect,
            launch(),
            Command::PrepareVisualization(FAKE_PROFILE.to_string()),
        ],
        vec![
            Command::Connect,
            launch(),
            Command::PrepareVisualization(FAKE_PROFILE.to_string()),
            run_code("x = 1"),
            Command::Pause,
        ],
    ];

    for setup in setups {
        let mut h = Harness::new();
        drive(&mut h.manager, setup).await;
        let launched = h.journal.with_prefix("run:").len();

        drive(&mut h.manager, vec![Command::Disconnect]).await;
        assert_eq!(h.manager.state(), State::Idle);
        assert!(h.manager.plan().is_none());
        assert_eq!(h.journal.with_prefix("terminate:").len(), launched);
    }
}

#[tokio::test]
async fn failing_world_control_does_not_block_transitions() {
    let journal = Journal::new();
    let mut h = Harness::with_parts(
        fake_catalog(),
        fake_registry(&journal),
        FakeApplication::new(journal.clone()),
        FakeWorldControl::new(journal.clone()).failing(),
        journal,
    );

    to_running(&mut h.manager).await;
    drive(&mut h.manager, vec![Command::Pause, Command::Resume, Command::Stop]).await;

    assert_eq!(h.manager.state(), State::VisualizationReady);
    assert_eq!(
        h.journal.with_prefix("world:"),
        ["world:unpause", "world:pause", "world:unpause", "world:pause", "world:reset"]
    );
}
