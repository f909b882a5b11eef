#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Value, json};

use sandbox_manager::config::{LaunchConfiguration, LaunchSection, LauncherSpec};
use sandbox_manager::launcher::LaunchCatalog;

use crate::fakes::fake_spec;

/// World with one fake world launcher labelled `world`.
pub const FAKE_WORLD: &str = "fake_world";
/// World without launchers.
pub const EMPTY_WORLD: &str = "empty_world";
/// Profile with one fake launcher labelled `view`.
pub const FAKE_PROFILE: &str = "fake_view";

/// Builder for `LaunchConfiguration` to simplify test setup.
pub struct LaunchConfigBuilder {
    config: LaunchConfiguration,
}

impl LaunchConfigBuilder {
    pub fn new(world: &str) -> Self {
        Self {
            config: LaunchConfiguration {
                world: world.to_string(),
                launch_file: "/opt/exercises/test.launch.py".to_string(),
                name: "Test Exercise".to_string(),
                exercise_id: "test_exercise".to_string(),
                visualization: None,
                launchers: BTreeMap::new(),
            },
        }
    }

    pub fn launcher(mut self, key: &str, spec: LauncherSpec) -> Self {
        self.config.launchers.insert(key.to_string(), spec);
        self
    }

    pub fn visualization(mut self, profile: &str) -> Self {
        self.config.visualization = Some(profile.to_string());
        self
    }

    pub fn exercise_id(mut self, id: &str) -> Self {
        self.config.exercise_id = id.to_string();
        self
    }

    pub fn build(self) -> LaunchConfiguration {
        self.config.validate().expect("builder produced an invalid launch configuration");
        self.config
    }

    /// The configuration as a `launch_world` payload.
    pub fn payload(self) -> Value {
        serde_json::to_value(self.build()).expect("launch configuration serializes")
    }
}

/// Launch settings with short polls and timeouts.
pub fn fast_launch_section() -> LaunchSection {
    LaunchSection {
        ros_version: 2,
        poll_interval: Duration::from_millis(10),
        readiness_timeout: Duration::from_secs(2),
        stop_timeout: Duration::from_secs(2),
        probe_timeout: Duration::from_secs(2),
    }
}

/// Catalog with [`FAKE_WORLD`], [`EMPTY_WORLD`] and [`FAKE_PROFILE`].
pub fn fake_catalog() -> LaunchCatalog {
    let mut catalog = LaunchCatalog::empty();
    catalog
        .with_world(FAKE_WORLD, 2, vec![fake_spec("world")])
        .with_world_without_launchers(EMPTY_WORLD)
        .with_profile(FAKE_PROFILE, vec![fake_spec("view")]);
    catalog
}

/// `{"id": .., "command": .., "data": ..}` frame text.
pub fn frame(id: &str, command: &str, data: Option<Value>) -> String {
    match data {
        Some(data) => json!({ "id": id, "command": command, "data": data }).to_string(),
        None => json!({ "id": id, "command": command }).to_string(),
    }
}
