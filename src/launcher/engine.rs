// src/launcher/engine.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::{LaunchConfiguration, LauncherSpec};
use crate::errors::{ManagerError, Result};
use crate::exec::ExitNotifier;
use crate::launcher::{Launcher, LaunchCatalog, LaunchContext, LauncherRegistry, strategy_identifier};
use crate::manager::ManagerEvent;
use crate::types::LauncherKind;

/// Launch stages, in launch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    World,
    Keyed,
    Visualization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::World => "world",
            Stage::Keyed => "keyed",
            Stage::Visualization => "visualization",
        };
        f.write_str(s)
    }
}

struct PlannedLauncher {
    key: String,
    stage: Stage,
    spec: LauncherSpec,
    instance: Option<Box<dyn Launcher>>,
    started: bool,
}

/// Every launcher materialized for one launch cycle, in launch order.
///
/// The plan owns the instances it started and is the only place they are
/// torn down from.
pub struct LaunchPlan {
    generation: u64,
    profile: Option<String>,
    slots: Vec<PlannedLauncher>,
}

impl fmt::Debug for LaunchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots: Vec<String> = self
            .slots
            .iter()
            .map(|s| format!("{}:{}", s.stage, s.key))
            .collect();
        f.debug_struct("LaunchPlan")
            .field("generation", &self.generation)
            .field("profile", &self.profile)
            .field("slots", &slots)
            .finish()
    }
}

impl LaunchPlan {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Keys of a stage in launch order.
    pub fn keys(&self, stage: Stage) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| s.stage == stage)
            .map(|s| s.key.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.iter().any(|s| s.key == key)
    }

    /// Keys whose launcher currently reports ready.
    pub fn running_keys(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| s.instance.as_ref().is_some_and(|l| l.is_running()))
            .map(|s| s.key.as_str())
            .collect()
    }

    /// Whether any launcher of the plan has been started.
    pub fn has_started(&self) -> bool {
        self.slots.iter().any(|s| s.started)
    }
}

/// Resolves launch configurations into plans and drives them.
pub struct LauncherEngine {
    registry: LauncherRegistry,
    catalog: LaunchCatalog,
    context: LaunchContext,
    events: mpsc::Sender<ManagerEvent>,
    next_generation: u64,
}

impl fmt::Debug for LauncherEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LauncherEngine")
            .field("registry", &self.registry)
            .field("next_generation", &self.next_generation)
            .finish_non_exhaustive()
    }
}

impl LauncherEngine {
    pub fn new(
        registry: LauncherRegistry,
        catalog: LaunchCatalog,
        context: LaunchContext,
        events: mpsc::Sender<ManagerEvent>,
    ) -> Self {
        Self {
            registry,
            catalog,
            context,
            events,
            next_generation: 1,
        }
    }

    pub fn context(&self) -> &LaunchContext {
        &self.context
    }

    pub fn registry(&self) -> &LauncherRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &LaunchCatalog {
        &self.catalog
    }

    /// Build the world and keyed stages for `config`.
    ///
    /// Every module is resolved here, so an unknown module rejects the
    /// launch before anything starts.
    pub fn plan(&mut self, config: &LaunchConfiguration) -> Result<LaunchPlan> {
        let mut slots = Vec::new();

        for (key, spec) in self.catalog.world_launchers(config, self.context.ros_version())? {
            slots.push(self.planned(key, Stage::World, spec)?);
        }
        for (key, spec) in &config.launchers {
            slots.push(self.planned(key.clone(), Stage::Keyed, spec.clone())?);
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        debug!(generation, world = %config.world, slots = slots.len(), "built launch plan");

        Ok(LaunchPlan {
            generation,
            profile: config.visualization.clone(),
            slots,
        })
    }

    /// Append the launchers of a visualization profile to `plan`.
    pub fn add_visualization(&self, plan: &mut LaunchPlan, profile: &str) -> Result<()> {
        let mut added = Vec::new();
        for (key, spec) in self.catalog.visualization_launchers(profile)? {
            added.push(self.planned(key, Stage::Visualization, spec)?);
        }
        plan.slots.extend(added);
        plan.profile = Some(profile.to_string());
        Ok(())
    }

    fn planned(&self, key: String, stage: Stage, spec: LauncherSpec) -> Result<PlannedLauncher> {
        self.registry.resolve(&spec)?;
        Ok(PlannedLauncher {
            key,
            stage,
            spec,
            instance: None,
            started: false,
        })
    }

    /// Run every stage in order: world, keyed, visualization.
    pub async fn run(&self, plan: &mut LaunchPlan) -> Result<()> {
        for stage in [Stage::World, Stage::Keyed, Stage::Visualization] {
            self.run_stage(plan, stage).await?;
        }
        Ok(())
    }

    /// Start every not-yet-started launcher of `stage`, one at a time,
    /// waiting for each to report ready before the next one starts.
    ///
    /// On failure the launchers started so far stay in the plan.
    pub async fn run_stage(&self, plan: &mut LaunchPlan, stage: Stage) -> Result<()> {
        let generation = plan.generation;
        for slot in plan.slots.iter_mut().filter(|s| s.stage == stage && !s.started) {
            let strategy = match slot.spec.kind {
                LauncherKind::Command => strategy_identifier("command"),
                LauncherKind::Module => strategy_identifier(&slot.spec.module),
            };
            info!(launcher = %slot.key, %stage, %strategy, generation, "starting launcher");

            let mut launcher = self.registry.create(&slot.spec)?;
            slot.started = true;

            let notifier = ExitNotifier::new(self.events.clone(), slot.key.clone(), generation);
            let result = launcher.run(&self.context, notifier).await;
            let launcher = slot.instance.insert(launcher);
            result?;

            self.wait_ready(&slot.key, launcher.as_ref()).await?;
            info!(launcher = %slot.key, %stage, "launcher ready");
        }
        Ok(())
    }

    async fn wait_ready(&self, key: &str, launcher: &dyn Launcher) -> Result<()> {
        let bound = self.context.launch.readiness_bound();
        let poll = self.context.launch.poll_interval;
        let started = Instant::now();

        while !launcher.is_running() {
            if let Some(limit) = bound {
                if started.elapsed() >= limit {
                    return Err(ManagerError::LaunchTimedOut {
                        launcher: key.to_string(),
                        waited: limit,
                    });
                }
            }
            sleep(poll).await;
        }
        Ok(())
    }

    /// Terminate every started launcher of `stage` and drop it from the plan.
    pub async fn clear_stage(&self, plan: &mut LaunchPlan, stage: Stage) {
        let (mut cleared, kept): (Vec<_>, Vec<_>) =
            plan.slots.drain(..).partition(|s| s.stage == stage);
        plan.slots = kept;
        for slot in cleared.iter_mut().rev() {
            self.terminate_slot(slot).await;
        }
    }

    /// Best-effort, total teardown in reverse launch order. Failures are
    /// logged; every launcher is still visited.
    pub async fn terminate(&self, plan: &mut LaunchPlan) {
        info!(generation = plan.generation, "terminating launch plan");
        for slot in plan.slots.iter_mut().rev() {
            self.terminate_slot(slot).await;
        }
    }

    async fn terminate_slot(&self, slot: &mut PlannedLauncher) {
        let Some(mut launcher) = slot.instance.take() else {
            return;
        };
        let was_running = launcher.is_running();
        match launcher.terminate(&self.context).await {
            Ok(()) => debug!(launcher = %slot.key, stage = %slot.stage, was_running, "launcher terminated"),
            Err(e) => warn!(
                launcher = %slot.key,
                stage = %slot.stage,
                error = %e,
                "launcher termination failed; continuing teardown"
            ),
        }
    }
}

