// src/config/mod.rs

//! Configuration for the sandbox manager.
//!
//! Two separate inputs live here:
//! - process settings, read once at startup from an optional TOML file
//!   (`model.rs`, `loader.rs`, `validate.rs`);
//! - the launch configuration carried by every `launch_world` command
//!   (`launch.rs`), validated as a unit before anything is started.

pub mod launch;
pub mod loader;
pub mod model;
pub mod validate;

pub use launch::{LaunchConfiguration, LauncherSpec};
pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    ApplicationSection, LaunchSection, LintSection, RawSettings, ServerSection, Settings,
    SimulationSection, VisualizationSection, WorkspaceSection,
};
