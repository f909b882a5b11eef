// src/launcher/catalog.rs

use std::collections::BTreeMap;

use crate::config::{LaunchConfiguration, LauncherSpec};
use crate::errors::{ManagerError, Result};

/// World and visualization profiles the engine expands launches from.
///
/// A world maps each ROS major version to the launchers that boot it; an
/// empty version map (the `physical` world) means nothing is launched.
#[derive(Debug, Clone, Default)]
pub struct LaunchCatalog {
    worlds: BTreeMap<String, BTreeMap<u8, Vec<LauncherSpec>>>,
    profiles: BTreeMap<String, Vec<LauncherSpec>>,
}

impl LaunchCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The worlds and profiles shipped with the sandbox image.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();

        catalog
            .with_world("gazebo", 1, vec![LauncherSpec::module("ros_api")])
            .with_world("gazebo", 2, vec![LauncherSpec::module("ros2_api")])
            .with_world("drones", 1, vec![LauncherSpec::module("drones")])
            .with_world("drones", 2, vec![LauncherSpec::module("drones_ros2")])
            .with_world_without_launchers("physical");

        catalog
            .with_profile("none", Vec::new())
            .with_profile("console", vec![console()])
            .with_profile("gazebo_gra", vec![console(), gazebo_view(), robot_display_view(":3")])
            .with_profile("gazebo_rae", vec![console(), gazebo_view()])
            .with_profile("physic_gra", vec![console(), robot_display_view(":2")])
            .with_profile("physic_rae", vec![console(), robot_display_view(":2")]);

        catalog
    }

    pub fn with_world(&mut self, world: impl Into<String>, ros_version: u8, specs: Vec<LauncherSpec>) -> &mut Self {
        self.worlds
            .entry(world.into())
            .or_default()
            .insert(ros_version, specs);
        self
    }

    pub fn with_world_without_launchers(&mut self, world: impl Into<String>) -> &mut Self {
        self.worlds.entry(world.into()).or_default();
        self
    }

    pub fn with_profile(&mut self, name: impl Into<String>, specs: Vec<LauncherSpec>) -> &mut Self {
        self.profiles.insert(name.into(), specs);
        self
    }

    pub fn world_names(&self) -> impl Iterator<Item = &str> {
        self.worlds.keys().map(String::as_str)
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// World launchers for a configuration, keyed by module name, with the
    /// configuration's launch file and exercise id filled in.
    pub fn world_launchers(
        &self,
        config: &LaunchConfiguration,
        ros_version: u8,
    ) -> Result<Vec<(String, LauncherSpec)>> {
        let versions = self.worlds.get(&config.world).ok_or_else(|| {
            ManagerError::ConfigError(format!("unknown world '{}'", config.world))
        })?;

        if versions.is_empty() {
            return Ok(Vec::new());
        }

        let specs = versions.get(&ros_version).ok_or_else(|| {
            ManagerError::ConfigError(format!(
                "world '{}' has no launchers for ROS version {ros_version}",
                config.world
            ))
        })?;

        Ok(specs
            .iter()
            .map(|spec| {
                let spec = spec
                    .clone()
                    .with_param("launch_file", config.launch_file.clone())
                    .with_param("exercise_id", config.exercise_id.clone());
                (spec.module.clone(), spec)
            })
            .collect())
    }

    /// Visualization launchers of a profile, keyed by module name.
    pub fn visualization_launchers(&self, profile: &str) -> Result<Vec<(String, LauncherSpec)>> {
        let specs = self.profiles.get(profile).ok_or_else(|| {
            ManagerError::ConfigError(format!("unknown visualization profile '{profile}'"))
        })?;
        Ok(specs
            .iter()
            .map(|spec| (spec.module.clone(), spec.clone()))
            .collect())
    }
}

fn console() -> LauncherSpec {
    LauncherSpec::module("console")
        .with_param("display", ":1")
        .with_param("internal_port", 5901)
        .with_param("external_port", 1108)
}

fn gazebo_view() -> LauncherSpec {
    LauncherSpec::module("gazebo_view")
        .with_param("display", ":2")
        .with_param("internal_port", 5900)
        .with_param("external_port", 6080)
        .with_param("width", 1024)
        .with_param("height", 768)
}

fn robot_display_view(display: &str) -> LauncherSpec {
    LauncherSpec::module("robot_display_view")
        .with_param("display", display)
        .with_param("internal_port", 5902)
        .with_param("external_port", 2303)
        .with_param("width", 1024)
        .with_param("height", 768)
}
