// src/exec/runner.rs

//! Background command runner: one shell command, one supervised process
//! tree, one waiter task.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use libc::c_int;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{ManagerError, Result};
use crate::exec::process_table::ProcessTable;
use crate::exec::supervisor::{self, TreeOutcome};
use crate::manager::ManagerEvent;

/// Unexpected exit of a supervised process, routed to the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitNotice {
    /// Key of the launcher that owned the process.
    pub launcher: String,
    /// Launch generation the launcher belonged to.
    pub generation: u64,
    pub pid: u32,
    pub exit_code: Option<i32>,
}

/// Handle given to a launcher so its runners can report deaths.
#[derive(Debug, Clone)]
pub struct ExitNotifier {
    tx: mpsc::Sender<ManagerEvent>,
    launcher: String,
    generation: u64,
}

impl ExitNotifier {
    pub fn new(tx: mpsc::Sender<ManagerEvent>, launcher: impl Into<String>, generation: u64) -> Self {
        Self {
            tx,
            launcher: launcher.into(),
            generation,
        }
    }

    /// Same channel and generation, different launcher key.
    pub fn for_launcher(&self, launcher: impl Into<String>) -> Self {
        Self {
            tx: self.tx.clone(),
            launcher: launcher.into(),
            generation: self.generation,
        }
    }

    pub fn launcher(&self) -> &str {
        &self.launcher
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn notify(&self, pid: u32, exit_code: Option<i32>) {
        let notice = ExitNotice {
            launcher: self.launcher.clone(),
            generation: self.generation,
            pid,
            exit_code,
        };
        if self.tx.send(ManagerEvent::LauncherDied(notice)).await.is_err() {
            debug!(launcher = %self.launcher, pid, "dispatch loop gone; dropping exit notice");
        }
    }
}

/// Extra process settings for [`CommandRunner::start`].
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Append stdout and stderr to this file instead of the log.
    pub log_file: Option<PathBuf>,
}

impl RunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

/// A shell command running in its own session.
///
/// The process is the leader of a new process group, so stopping it reaches
/// everything it forked, including children that outlived it. The pid stays
/// in the [`ProcessTable`] until the runner is stopped or dropped if such
/// children remain. The waiter task reports an [`ExitNotice`] only when the
/// process exits without [`CommandRunner::stop`] having been called.
#[derive(Debug)]
pub struct CommandRunner {
    name: String,
    command: String,
    pid: u32,
    table: ProcessTable,
    alive: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    waiter: Option<JoinHandle<()>>,
}

impl CommandRunner {
    pub fn start(
        name: impl Into<String>,
        command: impl Into<String>,
        options: RunnerOptions,
        table: &ProcessTable,
        notifier: Option<ExitNotifier>,
    ) -> Result<Self> {
        let name = name.into();
        let command = command.into();

        info!(launcher = %name, cmd = %command, "starting process");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&command).stdin(Stdio::null()).kill_on_drop(true);
        cmd.envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = &options.cwd {
            cmd.current_dir(dir);
        }

        let to_file = match &options.log_file {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                cmd.stdout(Stdio::from(file.try_clone()?));
                cmd.stderr(Stdio::from(file));
                true
            }
            None => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
                false
            }
        };

        #[cfg(unix)]
        {
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        let mut child = cmd.spawn().map_err(|e| {
            ManagerError::launcher(&name, format!("failed to spawn `{command}`: {e}"))
        })?;
        let pid = child
            .id()
            .ok_or_else(|| ManagerError::launcher(&name, "process exited before its pid was read"))?;

        table.insert(pid);

        if !to_file {
            if let Some(stdout) = child.stdout.take() {
                forward_output(name.clone(), "stdout", stdout);
            }
            if let Some(stderr) = child.stderr.take() {
                forward_output(name.clone(), "stderr", stderr);
            }
        }

        let alive = Arc::new(AtomicBool::new(true));
        let stopping = Arc::new(AtomicBool::new(false));

        let waiter = {
            let alive = Arc::clone(&alive);
            let stopping = Arc::clone(&stopping);
            let table = table.clone();
            let name = name.clone();
            tokio::spawn(async move {
                let status = child.wait().await;
                alive.store(false, Ordering::SeqCst);
                let leftovers = supervisor::group_members(pid);
                if leftovers.is_empty() {
                    table.remove(pid);
                } else {
                    debug!(launcher = %name, pid, ?leftovers, "process exited; its session lives on");
                }

                let exit_code = match status {
                    Ok(status) => status.code(),
                    Err(e) => {
                        warn!(launcher = %name, pid, error = %e, "failed to wait for process");
                        None
                    }
                };

                if stopping.load(Ordering::SeqCst) {
                    debug!(launcher = %name, pid, ?exit_code, "process exited after stop");
                    return;
                }

                warn!(launcher = %name, pid, ?exit_code, "process exited unexpectedly");
                if let Some(notifier) = notifier {
                    notifier.notify(pid, exit_code).await;
                }
            })
        };

        Ok(Self {
            name,
            command,
            pid,
            table: table.clone(),
            alive,
            stopping,
            waiter: Some(waiter),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// True until the waiter has observed the exit.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Send `signal` to the process tree, wait for it, then join the waiter.
    ///
    /// No exit notice is sent for a stopped runner. Calling `stop` again is
    /// a no-op apart from the (harmless) signal delivery.
    pub async fn stop(&mut self, signal: c_int, timeout: Option<Duration>) -> TreeOutcome {
        self.stopping.store(true, Ordering::SeqCst);

        let outcome = if self.owns_processes() {
            supervisor::terminate_tree(self.pid, signal, timeout).await
        } else {
            TreeOutcome {
                terminated: vec![self.pid],
                alive: Vec::new(),
            }
        };
        if outcome.is_clean() {
            self.table.remove(self.pid);
        }
        debug!(
            launcher = %self.name,
            cmd = %self.command,
            pid = self.pid,
            terminated = outcome.terminated.len(),
            alive = outcome.alive.len(),
            "stopped process tree"
        );

        if let Some(waiter) = self.waiter.take() {
            let abort = waiter.abort_handle();
            match timeout {
                Some(limit) => {
                    if tokio::time::timeout(limit, waiter).await.is_err() {
                        warn!(launcher = %self.name, pid = self.pid, "waiter did not finish; aborting");
                        abort.abort();
                    }
                }
                None => {
                    let _ = waiter.await;
                }
            }
        }

        outcome
    }

    /// The process itself, or anything left in its session once it exited.
    /// A reaped pid with an empty group may already belong to someone else.
    fn owns_processes(&self) -> bool {
        self.is_alive() || !supervisor::group_members(self.pid).is_empty()
    }

    /// Send a signal to the tree without waiting (SIGSTOP / SIGCONT).
    pub fn signal(&self, signal: c_int) {
        if self.is_alive() {
            supervisor::signal_tree(self.pid, signal);
        }
    }
}

impl Drop for CommandRunner {
    fn drop(&mut self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            if self.owns_processes() {
                supervisor::signal_tree(self.pid, libc::SIGKILL);
            }
            self.table.remove(self.pid);
        }
    }
}

fn forward_output<R>(name: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(launcher = %name, stream, "{}", line);
        }
    });
}
