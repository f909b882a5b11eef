// tests/process_supervision.rs
#![cfg(unix)]

mod common;

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

use sandbox_manager::exec::readiness;
use sandbox_manager::exec::supervisor::{self, descendants, is_alive};
use sandbox_manager::exec::{
    CommandRunner, ExitNotifier, ProcessTable, RunnerOptions, terminate_tree,
};
use sandbox_manager::manager::ManagerEvent;

use crate::common::{eventually, init_tracing, with_timeout};

const LIMIT: Duration = Duration::from_secs(5);

/// `sh` with two sleeping children, so the tree has three levels of pids
/// to find.
const TREE: &str = "sleep 30 & sleep 30 & wait";

#[cfg(target_os = "linux")]
fn proc_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.trim_start().chars().next()
}

#[tokio::test]
async fn stop_kills_the_whole_tree() {
    init_tracing();
    let table = ProcessTable::new();
    let mut runner = CommandRunner::start("tree", TREE, RunnerOptions::new(), &table, None).unwrap();
    let root = runner.pid();
    assert!(table.contains(root));

    assert!(eventually(LIMIT, || descendants(root).len() >= 2).await);
    let mut pids = descendants(root);
    pids.push(root);

    let outcome = with_timeout(runner.stop(libc::SIGKILL, Some(LIMIT))).await;
    assert!(outcome.is_clean(), "survivors: {:?}", outcome.alive);
    for pid in &pids {
        assert!(!is_alive(*pid), "pid {pid} survived");
    }
    assert!(!runner.is_alive());
    assert!(eventually(LIMIT, || table.is_empty()).await);

    // Stopping again, or terminating the dead pid, is harmless.
    let again = with_timeout(runner.stop(libc::SIGKILL, Some(LIMIT))).await;
    assert!(again.is_clean());
    let direct = with_timeout(terminate_tree(root, libc::SIGKILL, Some(LIMIT))).await;
    assert!(direct.is_clean());
}

#[tokio::test]
async fn pid_zero_is_never_signalled() {
    let outcome = terminate_tree(0, libc::SIGKILL, Some(Duration::from_millis(10))).await;
    assert!(outcome.terminated.is_empty() && outcome.alive.is_empty());
    assert!(supervisor::signal_tree(0, libc::SIGKILL).is_empty());
}

#[tokio::test]
async fn unexpected_exit_is_reported_with_its_code() {
    let (tx, mut rx) = mpsc::channel(4);
    let notifier = ExitNotifier::new(tx, "flaky", 7);
    let table = ProcessTable::new();

    let runner = CommandRunner::start("flaky", "sleep 0.2; exit 3", RunnerOptions::new(), &table, Some(notifier))
        .unwrap();

    let Some(ManagerEvent::LauncherDied(notice)) = with_timeout(rx.recv()).await else {
        panic!("expected an exit notice");
    };
    assert_eq!(notice.launcher, "flaky");
    assert_eq!(notice.generation, 7);
    assert_eq!(notice.pid, runner.pid());
    assert_eq!(notice.exit_code, Some(3));
    assert!(!runner.is_alive());
}

#[tokio::test]
async fn stopped_runner_reports_nothing() {
    let (tx, mut rx) = mpsc::channel(4);
    let table = ProcessTable::new();
    let mut runner = CommandRunner::start(
        "quiet",
        "sleep 30",
        RunnerOptions::new(),
        &table,
        Some(ExitNotifier::new(tx, "quiet", 1)),
    )
    .unwrap();

    with_timeout(runner.stop(libc::SIGKILL, Some(LIMIT))).await;

    match timeout(Duration::from_millis(300), rx.recv()).await {
        Ok(None) | Err(_) => {}
        Ok(Some(event)) => panic!("unexpected event after stop: {event:?}"),
    }
}

#[tokio::test]
async fn signal_all_reaches_every_registered_process() {
    let table = ProcessTable::new();
    let mut a = CommandRunner::start("a", "sleep 30", RunnerOptions::new(), &table, None).unwrap();
    let mut b = CommandRunner::start("b", TREE, RunnerOptions::new(), &table, None).unwrap();
    assert_eq!(table.len(), 2);

    let signalled = table.signal_all(libc::SIGKILL);
    assert_eq!(signalled.len(), 2);
    assert!(eventually(LIMIT, || !a.is_alive() && !b.is_alive()).await);
    assert!(eventually(LIMIT, || supervisor::group_members(b.pid()).is_empty()).await);

    with_timeout(a.stop(libc::SIGKILL, Some(LIMIT))).await;
    with_timeout(b.stop(libc::SIGKILL, Some(LIMIT))).await;
    assert!(table.is_empty());
}

fn read_pid(path: &std::path::Path) -> u32 {
    std::fs::read_to_string(path).unwrap().trim().parse().unwrap()
}

/// Backgrounds a sleeper, records its pid and exits, leaving the sleeper
/// re-parented away from the tree but still in the session.
fn leaky(pid_file: &std::path::Path) -> String {
    format!("sleep 30 & echo $! > {}; exit 0", pid_file.display())
}

#[tokio::test]
async fn orphaned_children_are_killed_with_their_session() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("orphan.pid");
    let table = ProcessTable::new();
    let mut runner = CommandRunner::start("leaky", leaky(&pid_file), RunnerOptions::new(), &table, None).unwrap();
    let root = runner.pid();

    assert!(eventually(LIMIT, || !runner.is_alive()).await);
    let orphan = read_pid(&pid_file);
    assert!(is_alive(orphan));
    assert!(!descendants(root).contains(&orphan));
    assert_eq!(supervisor::group_members(root), vec![orphan]);
    assert!(table.contains(root), "a session with live members left the table");

    let outcome = with_timeout(runner.stop(libc::SIGKILL, Some(LIMIT))).await;
    assert!(outcome.is_clean(), "survivors: {:?}", outcome.alive);
    assert!(outcome.terminated.contains(&orphan));
    assert!(!is_alive(orphan));
    assert!(table.is_empty());
}

#[tokio::test]
async fn terminate_tree_reaches_the_session_after_its_leader_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("orphan.pid");
    let table = ProcessTable::new();
    let runner = CommandRunner::start("leaky", leaky(&pid_file), RunnerOptions::new(), &table, None).unwrap();
    let root = runner.pid();

    assert!(eventually(LIMIT, || !runner.is_alive()).await);
    let orphan = read_pid(&pid_file);
    assert!(is_alive(orphan));

    let outcome = with_timeout(terminate_tree(root, libc::SIGKILL, Some(LIMIT))).await;
    assert!(outcome.is_clean());
    assert_eq!(outcome.terminated, vec![root, orphan]);
    assert!(supervisor::group_members(root).is_empty());

    drop(runner);
    assert!(table.is_empty());
}

#[tokio::test]
async fn dropping_a_runner_kills_its_orphans() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("orphan.pid");
    let table = ProcessTable::new();
    let runner = CommandRunner::start("leaky", leaky(&pid_file), RunnerOptions::new(), &table, None).unwrap();

    assert!(eventually(LIMIT, || !runner.is_alive()).await);
    let orphan = read_pid(&pid_file);
    assert!(is_alive(orphan));

    drop(runner);
    assert!(eventually(LIMIT, || !is_alive(orphan)).await);
    assert!(table.is_empty());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn sigstop_and_sigcont_reach_the_tree() {
    let table = ProcessTable::new();
    let mut runner = CommandRunner::start("paused", TREE, RunnerOptions::new(), &table, None).unwrap();
    let root = runner.pid();
    assert!(eventually(LIMIT, || descendants(root).len() >= 2).await);
    let children = descendants(root);

    runner.signal(libc::SIGSTOP);
    assert!(eventually(LIMIT, || children.iter().all(|p| proc_state(*p) == Some('T'))).await);
    assert!(runner.is_alive());

    runner.signal(libc::SIGCONT);
    assert!(eventually(LIMIT, || children.iter().all(|p| proc_state(*p) != Some('T'))).await);

    with_timeout(runner.stop(libc::SIGKILL, Some(LIMIT))).await;
}

#[tokio::test]
async fn runner_options_reach_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("out.log");
    let table = ProcessTable::new();

    let options = RunnerOptions::new()
        .env("GREETING", "hello")
        .cwd(dir.path())
        .log_file(&log);
    let _runner = CommandRunner::start("env", "echo \"$GREETING from $(pwd)\"", options, &table, None).unwrap();

    let expected = format!("hello from {}", dir.path().display());
    assert!(
        eventually(LIMIT, || std::fs::read_to_string(&log).is_ok_and(|s| s.contains(&expected))).await,
        "log: {:?}",
        std::fs::read_to_string(&log)
    );
}

#[tokio::test]
async fn readiness_probes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    readiness::wait_for_port("127.0.0.1", port, LIMIT).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ready");
    let late = marker.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(late, b"").unwrap();
    });
    readiness::wait_for_path(&marker, LIMIT).await.unwrap();

    let log = dir.path().join("server.log");
    std::fs::write(&log, "booting\nlistening on 8080\n").unwrap();
    let pattern = regex::Regex::new(r"listening on \d+").unwrap();
    readiness::wait_for_log_line(&log, &pattern, LIMIT).await.unwrap();

    let missing = dir.path().join("never");
    let err = readiness::wait_for_path(&missing, Duration::from_millis(100))
        .await
        .unwrap_err();
    assert_eq!(err.waited, Duration::from_millis(100));
    assert_eq!(err.into_launch_error("probe").code(), "launch_timeout");
}
