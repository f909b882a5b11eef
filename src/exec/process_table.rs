// src/exec/process_table.rs

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use libc::c_int;
use tracing::warn;

use crate::exec::supervisor;

/// Pids of every process started by a [`crate::exec::CommandRunner`] that
/// has not been reaped yet.
///
/// Shared between runners and the Ctrl-C task, which uses it to kill
/// everything when the regular cleanup does not finish in time.
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    inner: Arc<Mutex<BTreeSet<u32>>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pid: u32) {
        self.lock().insert(pid);
    }

    pub fn remove(&self, pid: u32) {
        self.lock().remove(&pid);
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.lock().contains(&pid)
    }

    pub fn snapshot(&self) -> Vec<u32> {
        self.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Signal every registered tree without waiting. Returns the pids that
    /// were registered.
    pub fn signal_all(&self, signal: c_int) -> Vec<u32> {
        let pids = self.snapshot();
        for pid in &pids {
            supervisor::signal_tree(*pid, signal);
        }
        if !pids.is_empty() {
            warn!(count = pids.len(), signal, "signalled every supervised process");
        }
        pids
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<u32>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
