#![allow(dead_code)]

//! Scriptable stand-ins for launchers, the application and simulation
//! control. Every fake writes what it was asked to do into a shared
//! [`Journal`], so tests can assert on ordering across components.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Deserialize;

use sandbox_manager::application::{AppFuture, Application, CodeSubmission};
use sandbox_manager::config::LauncherSpec;
use sandbox_manager::errors::{ManagerError, Result};
use sandbox_manager::exec::ExitNotifier;
use sandbox_manager::launcher::{LaunchContext, LaunchFuture, Launcher, LauncherRegistry};
use sandbox_manager::simulation::WorldControl;

pub const FAKE_MODULE: &str = "fake";

#[derive(Default)]
struct JournalState {
    entries: Vec<String>,
    notifiers: BTreeMap<String, ExitNotifier>,
}

/// Shared, ordered record of every fake call.
#[derive(Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<JournalState>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.inner.lock().unwrap().entries.push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.inner.lock().unwrap().entries.clone()
    }

    /// Entries starting with `prefix`, e.g. `"run:"`.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().entries.clear();
    }

    /// Notifier handed to the fake launcher with this label on its last run.
    pub fn notifier(&self, label: &str) -> Option<ExitNotifier> {
        self.inner.lock().unwrap().notifiers.get(label).cloned()
    }

    fn keep_notifier(&self, label: &str, notifier: ExitNotifier) {
        self.inner
            .lock()
            .unwrap()
            .notifiers
            .insert(label.to_string(), notifier);
    }
}

/// Behaviour of a [`FakeLauncher`], read from its spec parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FakeBehaviour {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub fail_run: bool,
    #[serde(default)]
    pub never_ready: bool,
    #[serde(default)]
    pub ready_delay_ms: u64,
    #[serde(default)]
    pub fail_terminate: bool,
}

/// Spec for the fake module with the given label.
pub fn fake_spec(label: &str) -> LauncherSpec {
    LauncherSpec::module(FAKE_MODULE).with_param("label", label)
}

pub struct FakeLauncher {
    label: String,
    behaviour: FakeBehaviour,
    journal: Journal,
    started: Option<Instant>,
}

impl FakeLauncher {
    pub fn new(label: impl Into<String>, behaviour: FakeBehaviour, journal: Journal) -> Self {
        Self {
            label: label.into(),
            behaviour,
            journal,
            started: None,
        }
    }
}

impl Launcher for FakeLauncher {
    fn run<'a>(
        &'a mut self,
        _ctx: &'a LaunchContext,
        notifier: ExitNotifier,
    ) -> LaunchFuture<'a, Result<()>> {
        Box::pin(async move {
            self.journal.record(format!("run:{}", self.label));
            self.journal.keep_notifier(&self.label, notifier);
            if self.behaviour.fail_run {
                return Err(ManagerError::launcher(&self.label, "scripted run failure"));
            }
            self.started = Some(Instant::now());
            Ok(())
        })
    }

    fn is_running(&self) -> bool {
        if self.behaviour.never_ready {
            return false;
        }
        self.started.is_some_and(|t| {
            t.elapsed() >= Duration::from_millis(self.behaviour.ready_delay_ms)
        })
    }

    fn terminate<'a>(&'a mut self, _ctx: &'a LaunchContext) -> LaunchFuture<'a, Result<()>> {
        Box::pin(async move {
            self.journal.record(format!("terminate:{}", self.label));
            self.started = None;
            if self.behaviour.fail_terminate {
                return Err(ManagerError::launcher(&self.label, "scripted terminate failure"));
            }
            Ok(())
        })
    }
}

/// Built-in registry plus the [`FAKE_MODULE`] writing into `journal`.
pub fn fake_registry(journal: &Journal) -> LauncherRegistry {
    let mut registry = LauncherRegistry::builtin();
    let journal = journal.clone();
    registry.register(FAKE_MODULE, move |spec: &LauncherSpec| {
        let behaviour: FakeBehaviour = spec.parameters_as()?;
        let label = behaviour
            .label
            .clone()
            .unwrap_or_else(|| spec.module.clone());
        Ok(Box::new(FakeLauncher::new(label, behaviour, journal.clone())) as Box<dyn Launcher>)
    });
    registry
}

/// Records every call; `load_code` fails with `LintFailed` when asked to.
pub struct FakeApplication {
    journal: Journal,
    fail_lint: bool,
    loaded: Option<String>,
    alive: bool,
    paused: bool,
}

impl FakeApplication {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_lint: false,
            loaded: None,
            alive: false,
            paused: false,
        }
    }

    pub fn failing_lint(mut self) -> Self {
        self.fail_lint = true;
        self
    }
}

impl Application for FakeApplication {
    fn load_code<'a>(
        &'a mut self,
        submission: &'a CodeSubmission,
        exercise_id: Option<&'a str>,
    ) -> AppFuture<'a, Result<()>> {
        Box::pin(async move {
            self.journal
                .record(format!("app:load:{}", exercise_id.unwrap_or("-")));
            if self.fail_lint {
                return Err(ManagerError::LintFailed("line 1: scripted".to_string()));
            }
            self.loaded = Some(submission.code.clone());
            Ok(())
        })
    }

    fn run(&mut self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal.record("app:run");
            if self.loaded.is_none() {
                return Err(ManagerError::Application("no code loaded".to_string()));
            }
            self.alive = true;
            self.paused = false;
            Ok(())
        })
    }

    fn pause(&mut self) -> Result<()> {
        self.journal.record("app:pause");
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.journal.record("app:resume");
        self.paused = false;
        Ok(())
    }

    fn stop(&mut self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal.record("app:stop");
            self.alive = false;
            Ok(())
        })
    }

    fn restart(&mut self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move {
            self.stop().await?;
            self.run().await
        })
    }

    fn terminate(&mut self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move {
            self.journal.record("app:terminate");
            self.alive = false;
            self.loaded = None;
            Ok(())
        })
    }

    fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Records `world:pause`, `world:unpause`, `world:reset`.
pub struct FakeWorldControl {
    journal: Journal,
    failing: bool,
}

impl FakeWorldControl {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            failing: false,
        }
    }

    /// Every operation records, then fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn outcome(&self, op: &str) -> Result<()> {
        self.journal.record(format!("world:{op}"));
        if self.failing {
            Err(ManagerError::Other(anyhow::anyhow!("scripted {op} failure")))
        } else {
            Ok(())
        }
    }
}

impl WorldControl for FakeWorldControl {
    fn pause(&self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move { self.outcome("pause") })
    }

    fn unpause(&self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move { self.outcome("unpause") })
    }

    fn reset(&self) -> AppFuture<'_, Result<()>> {
        Box::pin(async move { self.outcome("reset") })
    }
}
