// src/launcher/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::LauncherSpec;
use crate::errors::{ManagerError, Result};
use crate::launcher::Launcher;
use crate::launcher::strategies;
use crate::types::LauncherKind;

/// Builds a launcher instance from its spec. Fails on invalid parameters.
pub type LauncherFactory = Arc<dyn Fn(&LauncherSpec) -> Result<Box<dyn Launcher>> + Send + Sync>;

/// Explicit module name → factory table.
#[derive(Clone, Default)]
pub struct LauncherRegistry {
    factories: BTreeMap<String, LauncherFactory>,
}

impl fmt::Debug for LauncherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LauncherRegistry")
            .field("modules", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LauncherRegistry {
    /// Empty registry (tests register their own strategies).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        strategies::register_builtin(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, module: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&LauncherSpec) -> Result<Box<dyn Launcher>> + Send + Sync + 'static,
    {
        self.factories.insert(module.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, module: &str) -> bool {
        self.factories.contains_key(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Look up the factory for a spec. `type = "command"` specs always
    /// resolve to the `command` strategy.
    pub fn resolve(&self, spec: &LauncherSpec) -> Result<LauncherFactory> {
        let module = match spec.kind {
            LauncherKind::Command => strategies::COMMAND_MODULE,
            LauncherKind::Module => spec.module.as_str(),
        };
        self.factories
            .get(module)
            .cloned()
            .ok_or_else(|| ManagerError::UnknownLauncher {
                module: module.to_string(),
                identifier: strategy_identifier(module),
            })
    }

    /// Resolve and construct in one step.
    pub fn create(&self, spec: &LauncherSpec) -> Result<Box<dyn Launcher>> {
        let factory = self.resolve(spec)?;
        factory(spec)
    }
}

/// Strategy identifier for a module name, used in logs and errors:
/// `robot_display_view` → `LauncherRobotDisplayView`.
pub fn strategy_identifier(module: &str) -> String {
    let mut out = String::from("Launcher");
    for part in module.split('_').filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
