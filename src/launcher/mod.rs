// src/launcher/mod.rs

//! Launchers: pluggable units that each start and supervise one external
//! resource (simulation backend, virtual display, bridge) as OS processes.
//!
//! - [`registry`] maps module names to strategy factories.
//! - [`catalog`] holds the built-in world and visualization profiles.
//! - [`engine`] builds a [`LaunchPlan`] and runs/terminates it in order.
//! - [`strategies`] contains the concrete launchers.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::config::LaunchSection;
use crate::errors::Result;
use crate::exec::{ExitNotifier, ProcessTable};

pub mod catalog;
pub mod engine;
pub mod registry;
pub mod strategies;

pub use catalog::LaunchCatalog;
pub use engine::{LaunchPlan, LauncherEngine, Stage};
pub use registry::{LauncherFactory, LauncherRegistry, strategy_identifier};

/// Boxed future returned by [`Launcher`] methods.
pub type LaunchFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A running strategy object.
///
/// Created by the engine for one launch and dropped once `terminate` has
/// returned; never reused.
pub trait Launcher: Send + Sync {
    /// Start the underlying processes. Deaths are reported through
    /// `notifier` unless `terminate` was called first.
    fn run<'a>(
        &'a mut self,
        ctx: &'a LaunchContext,
        notifier: ExitNotifier,
    ) -> LaunchFuture<'a, Result<()>>;

    /// Readiness: true once dependents may start.
    fn is_running(&self) -> bool;

    /// Stop every process this launcher started. Must be safe to call more
    /// than once and on a launcher whose `run` failed halfway.
    fn terminate<'a>(&'a mut self, ctx: &'a LaunchContext) -> LaunchFuture<'a, Result<()>>;
}

/// Environment shared by every launcher of a process.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub table: ProcessTable,
    pub launch: LaunchSection,
    /// DRI device used for VirtualGL when GPU acceleration is available.
    pub gpu_device: Option<PathBuf>,
    /// Directory receiving the X server and launcher log files.
    pub log_dir: PathBuf,
}

impl LaunchContext {
    pub fn new(table: ProcessTable, launch: LaunchSection) -> Self {
        Self {
            table,
            launch,
            gpu_device: None,
            log_dir: std::env::temp_dir(),
        }
    }

    pub fn with_gpu_device(mut self, device: Option<PathBuf>) -> Self {
        self.gpu_device = device;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn ros_version(&self) -> u8 {
        self.launch.ros_version
    }
}
