// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`supervisor`] kills process trees and reports what died.
//! - [`runner`] wraps one shell command in a supervised process with a
//!   waiter task that reports unexpected exits to the dispatch loop.
//! - [`readiness`] holds the polling probes launchers wait on.
//! - [`process_table`] tracks every live pid for emergency shutdown.

pub mod process_table;
pub mod readiness;
pub mod runner;
pub mod supervisor;

pub use process_table::ProcessTable;
pub use runner::{CommandRunner, ExitNotice, ExitNotifier, RunnerOptions};
pub use supervisor::{TreeOutcome, terminate_tree};
