// tests/application_process.rs
#![cfg(unix)]

mod common;

use std::time::Duration;

use sandbox_manager::application::{
    Application, CodeSubmission, CommandLinter, LintContext, Linter, NoopLinter, ProcessApplication,
};
use sandbox_manager::config::ApplicationSection;
use sandbox_manager::exec::ProcessTable;
use sandbox_manager::exec::supervisor::{descendants, is_alive};
use sandbox_manager::workspace::Workspace;

use crate::common::{eventually, init_tracing, with_timeout};

const LIMIT: Duration = Duration::from_secs(5);

fn application(dir: &std::path::Path, linter: Box<dyn Linter>) -> (ProcessApplication, ProcessTable) {
    let workspace = Workspace::new(dir);
    workspace.ensure().unwrap();
    let settings = ApplicationSection {
        interpreter: "sh".to_string(),
        ..ApplicationSection::default()
    };
    let table = ProcessTable::new();
    let app = ProcessApplication::new(settings, workspace, linter, table.clone(), LIMIT);
    (app, table)
}

#[cfg(target_os = "linux")]
fn stopped(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            let rest = stat[stat.rfind(')')? + 1..].trim_start().to_string();
            rest.chars().next()
        })
        == Some('T')
}

#[tokio::test]
async fn runs_the_persisted_code_with_the_interpreter() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (mut app, table) = application(dir.path(), Box::new(NoopLinter));
    let marker = dir.path().join("ran");

    let code = format!("echo started > {}\nsleep 30\n", marker.display());
    with_timeout(app.load_code(&CodeSubmission::new(code.clone()), Some("follow_line")))
        .await
        .unwrap();

    let code_path = dir.path().join("code").join("academy.py");
    assert_eq!(std::fs::read_to_string(&code_path).unwrap(), code);
    assert_eq!(
        app.loaded_command(),
        Some(format!("sh '{}'", code_path.display()).as_str())
    );

    with_timeout(app.run()).await.unwrap();
    assert!(app.is_alive());
    assert_eq!(table.len(), 1);
    assert!(eventually(LIMIT, || marker.exists()).await);

    with_timeout(app.stop()).await.unwrap();
    assert!(!app.is_alive());
    assert!(app.loaded_command().is_some(), "stop keeps the code");
    assert!(eventually(LIMIT, || table.is_empty()).await);

    with_timeout(app.terminate()).await.unwrap();
    assert!(app.loaded_command().is_none());
    let err = with_timeout(app.run()).await.unwrap_err();
    assert_eq!(err.code(), "application");
}

#[tokio::test]
async fn submission_overrides_entrypoint_and_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _table) = application(dir.path(), Box::new(NoopLinter));

    let submission = CodeSubmission {
        code: "unused".to_string(),
        entrypoint: Some("/opt/runner.sh".to_string()),
        parameters: vec!["--speed".to_string(), "it's fast".to_string()],
    };
    with_timeout(app.load_code(&submission, None)).await.unwrap();
    assert_eq!(
        app.loaded_command(),
        Some(r"sh '/opt/runner.sh' '--speed' 'it'\''s fast'")
    );
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn pause_and_resume_reach_the_program() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, table) = application(dir.path(), Box::new(NoopLinter));

    let code = "sleep 30 & wait\n";
    with_timeout(app.load_code(&CodeSubmission::new(code), None)).await.unwrap();
    with_timeout(app.run()).await.unwrap();

    let root = table.snapshot()[0];
    assert!(eventually(LIMIT, || !descendants(root).is_empty()).await);
    let mut tree = descendants(root);
    tree.push(root);

    app.pause().unwrap();
    assert!(eventually(LIMIT, || tree.iter().all(|p| stopped(*p))).await);

    app.resume().unwrap();
    assert!(eventually(LIMIT, || tree.iter().all(|p| !stopped(*p))).await);

    // Restarting replaces the old tree.
    with_timeout(app.restart()).await.unwrap();
    for pid in &tree {
        assert!(!is_alive(*pid), "pid {pid} survived restart");
    }
    assert!(app.is_alive());
    with_timeout(app.terminate()).await.unwrap();
}

#[tokio::test]
async fn pause_without_a_program_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _table) = application(dir.path(), Box::new(NoopLinter));
    app.pause().unwrap();
    app.resume().unwrap();
    with_timeout(app.stop()).await.unwrap();
}

#[tokio::test]
async fn lint_findings_reject_the_code() {
    let dir = tempfile::tempdir().unwrap();
    let checker = r#"grep -q bad {file} && echo "{file}:3: error bad name"; echo "{file}:4: note fine""#;
    let linter = CommandLinter::new(checker, "error").unwrap();
    let (mut app, _table) = application(dir.path(), Box::new(linter));

    with_timeout(app.load_code(&CodeSubmission::new("x = 1"), None))
        .await
        .unwrap();
    let before = app.loaded_command().map(str::to_string);

    let err = with_timeout(app.load_code(&CodeSubmission::new("bad name"), None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "lint");
    assert!(err.to_string().contains("line 3:"), "{err}");
    assert_eq!(app.loaded_command().map(str::to_string), before);
}

#[tokio::test]
async fn rejected_code_never_runs() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let linter = CommandLinter::new(r#"grep -q REJECT {file} && echo "{file}:1: error rejected""#, "error").unwrap();
    let (mut app, _table) = application(dir.path(), Box::new(linter));
    let marker = dir.path().join("marker");

    let accepted = format!("echo good > {}\n", marker.display());
    with_timeout(app.load_code(&CodeSubmission::new(accepted.clone()), None))
        .await
        .unwrap();

    let rejected = format!("# REJECT\necho bad > {}\n", marker.display());
    let err = with_timeout(app.load_code(&CodeSubmission::new(rejected), None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "lint");

    let code_dir = dir.path().join("code");
    assert_eq!(std::fs::read_to_string(code_dir.join("academy.py")).unwrap(), accepted);
    assert!(!code_dir.join(".staged_academy.py").exists());

    with_timeout(app.run()).await.unwrap();
    let ran = || std::fs::read_to_string(&marker).is_ok_and(|text| text.trim() == "good");
    assert!(eventually(LIMIT, ran).await);
    with_timeout(app.terminate()).await.unwrap();
}

#[tokio::test]
async fn command_linter_reports_line_numbers_and_exercise() {
    let linter = CommandLinter::new(r#"echo "{file}:12: error in {exercise_id}""#, "error").unwrap();
    let context = LintContext {
        code_path: "/tmp/academy.py".into(),
        exercise_id: Some("follow_line".to_string()),
    };

    let diagnostics = with_timeout(linter.check("", &context)).await.unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].line, Some(12));
    assert_eq!(diagnostics[0].message, "/tmp/academy.py:12: error in follow_line");

    let clean = CommandLinter::new("echo all good", "error").unwrap();
    assert!(with_timeout(clean.check("", &context)).await.unwrap().is_empty());
    assert!(with_timeout(NoopLinter.check("anything", &context)).await.unwrap().is_empty());
}

#[test]
fn invalid_lint_pattern_is_a_config_error() {
    let err = CommandLinter::new("true", "(").unwrap_err();
    assert_eq!(err.code(), "config");
}
