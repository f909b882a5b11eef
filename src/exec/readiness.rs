// src/exec/readiness.rs

//! Readiness probes used by launcher strategies.
//!
//! Each probe polls until its condition holds or its own timeout expires.

use std::fs;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::errors::ManagerError;

const PROBE_STEP: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
#[error("timed out after {waited:?} waiting for {probe}")]
pub struct ProbeTimedOut {
    pub probe: String,
    pub waited: Duration,
}

impl ProbeTimedOut {
    pub fn into_launch_error(self, launcher: &str) -> ManagerError {
        ManagerError::LaunchTimedOut {
            launcher: format!("{launcher} ({})", self.probe),
            waited: self.waited,
        }
    }
}

/// Poll `check` every `step` until it returns true or `timeout` elapses.
pub async fn poll_until<F, Fut>(
    probe: impl Into<String>,
    timeout: Duration,
    step: Duration,
    mut check: F,
) -> Result<(), ProbeTimedOut>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let probe = probe.into();
    let started = Instant::now();
    loop {
        if check().await {
            debug!(probe = %probe, elapsed = ?started.elapsed(), "probe satisfied");
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(ProbeTimedOut {
                probe,
                waited: timeout,
            });
        }
        sleep(step).await;
    }
}

/// Wait until something accepts TCP connections on `host:port`.
pub async fn wait_for_port(host: &str, port: u16, timeout: Duration) -> Result<(), ProbeTimedOut> {
    let addr = format!("{host}:{port}");
    poll_until(format!("port {addr}"), timeout, PROBE_STEP, || {
        let addr = addr.clone();
        async move { TcpStream::connect(&addr).await.is_ok() }
    })
    .await
}

/// Wait until `path` exists (for example an X display socket).
pub async fn wait_for_path(path: &Path, timeout: Duration) -> Result<(), ProbeTimedOut> {
    poll_until(
        format!("path {}", path.display()),
        timeout,
        PROBE_STEP,
        || async move { path.exists() },
    )
    .await
}

/// Wait until a process whose command line contains `pattern` is running.
pub async fn wait_for_process(pattern: &str, timeout: Duration) -> Result<(), ProbeTimedOut> {
    poll_until(
        format!("process matching '{pattern}'"),
        timeout,
        PROBE_STEP,
        || async move { process_running(pattern) },
    )
    .await
}

/// Wait until a line of the file at `path` matches `pattern`.
pub async fn wait_for_log_line(
    path: &Path,
    pattern: &Regex,
    timeout: Duration,
) -> Result<(), ProbeTimedOut> {
    poll_until(
        format!("'{}' in {}", pattern.as_str(), path.display()),
        timeout,
        PROBE_STEP,
        || async move {
            fs::read_to_string(path)
                .map(|contents| contents.lines().any(|line| pattern.is_match(line)))
                .unwrap_or(false)
        },
    )
    .await
}

/// `pgrep -f` equivalent over `/proc/*/cmdline`.
pub fn process_running(pattern: &str) -> bool {
    let own_pid = std::process::id();
    let Ok(entries) = fs::read_dir("/proc") else {
        return false;
    };
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .filter(|pid| *pid != own_pid)
        .any(|pid| {
            fs::read(format!("/proc/{pid}/cmdline"))
                .map(|raw| {
                    let cmdline: String = String::from_utf8_lossy(&raw).replace('\0', " ");
                    cmdline.contains(pattern)
                })
                .unwrap_or(false)
        })
}
