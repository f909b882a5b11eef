// src/exec/supervisor.rs

//! Process-tree supervisor.
//!
//! Every teardown path (launcher stop, application stop, Ctrl-C, death
//! handling) ends up here. A process that is already gone is never an
//! error: `ESRCH` counts as success and zombies count as exited, so calling
//! [`terminate_tree`] repeatedly on the same pid is harmless.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::time::Duration;

use libc::c_int;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace, warn};

const WAIT_STEP: Duration = Duration::from_millis(50);

/// Result of a [`terminate_tree`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeOutcome {
    /// Processes confirmed gone (exited, reaped or zombie).
    pub terminated: Vec<u32>,
    /// Processes still alive when the wait ended.
    pub alive: Vec<u32>,
}

impl TreeOutcome {
    pub fn is_clean(&self) -> bool {
        self.alive.is_empty()
    }
}

/// Send `signal` to `pid` and its whole tree, then wait up to `timeout`
/// for all of them to exit (`None` waits until they are gone).
///
/// Descendants are snapshotted before anything is signalled. When `pid`
/// leads a process group, the group is signalled as well so orphans that
/// were re-parented away from the tree are still reached.
pub async fn terminate_tree(pid: u32, signal: c_int, timeout: Option<Duration>) -> TreeOutcome {
    if pid == 0 {
        return TreeOutcome::default();
    }

    let targets = signal_tree(pid, signal);
    debug!(pid, signal, targets = targets.len(), "signalled process tree");

    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        let alive: Vec<u32> = targets.iter().copied().filter(|p| is_alive(*p)).collect();
        if alive.is_empty() {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        sleep(WAIT_STEP).await;
    }

    let (alive, terminated): (Vec<u32>, Vec<u32>) =
        targets.into_iter().partition(|p| is_alive(*p));

    if !alive.is_empty() {
        warn!(pid, ?alive, "processes survived termination");
    }

    TreeOutcome { terminated, alive }
}

/// Signal `pid`, its process group and every descendant, without waiting.
/// Returns every pid that was targeted, `pid` first.
///
/// The group is signalled while `pid` leads it and also after `pid` itself
/// has been reaped, as long as members with that pgid remain. Orphans that
/// were re-parented to init are reached that way.
///
/// Used directly for SIGSTOP/SIGCONT.
pub fn signal_tree(pid: u32, signal: c_int) -> Vec<u32> {
    if pid == 0 {
        return Vec::new();
    }

    // Snapshot before signalling; a dying parent hands its children to init.
    let members = group_members(pid);
    let leads_group = !members.is_empty() || is_group_leader(pid);
    if !leads_group && !proc_exists(pid) {
        trace!(pid, signal, "nothing left to signal");
        return vec![pid];
    }

    let mut targets = BTreeSet::new();
    targets.extend(descendants(pid));
    targets.extend(members);
    targets.remove(&pid);

    if leads_group {
        send_signal_group(pid, signal);
    }
    for child in &targets {
        send_signal(*child, signal);
    }
    send_signal(pid, signal);

    let mut ordered = Vec::with_capacity(targets.len() + 1);
    ordered.push(pid);
    ordered.extend(targets);
    ordered
}

/// Whether `pid` refers to a live, non-zombie process.
pub fn is_alive(pid: u32) -> bool {
    let Some(raw) = as_raw_pid(pid) else {
        return false;
    };

    let rc = unsafe { libc::kill(raw, 0) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        // EPERM: exists but belongs to someone else.
        if err.raw_os_error() != Some(libc::EPERM) {
            return false;
        }
    }

    match read_stat(pid) {
        Some(stat) => stat.state != 'Z' && stat.state != 'X',
        None => true,
    }
}

/// All descendants of `pid`, recursively.
///
/// Reads `/proc/<pid>/task/*/children`; when that is unavailable, falls back
/// to a parent scan over `/proc/*/stat`.
pub fn descendants(pid: u32) -> Vec<u32> {
    match descendants_from_children_files(pid) {
        Some(found) => found,
        None => descendants_from_parent_scan(pid),
    }
}

fn descendants_from_children_files(root: u32) -> Option<Vec<u32>> {
    let mut found = Vec::new();
    let mut seen = BTreeSet::from([root]);
    let mut queue = VecDeque::from([root]);

    while let Some(pid) = queue.pop_front() {
        let tasks = match fs::read_dir(format!("/proc/{pid}/task")) {
            Ok(tasks) => tasks,
            // The root must be readable; vanished descendants are fine.
            Err(_) if pid == root => {
                return if proc_exists(root) { None } else { Some(Vec::new()) };
            }
            Err(_) => continue,
        };

        for task in tasks.flatten() {
            let children_path = task.path().join("children");
            let Ok(contents) = fs::read_to_string(&children_path) else {
                if pid == root {
                    return None;
                }
                continue;
            };
            for child in contents.split_whitespace().filter_map(|s| s.parse::<u32>().ok()) {
                if seen.insert(child) {
                    found.push(child);
                    queue.push_back(child);
                }
            }
        }
    }

    Some(found)
}

fn descendants_from_parent_scan(root: u32) -> Vec<u32> {
    let mut by_parent: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for stat in scan_proc() {
        by_parent.entry(stat.ppid).or_default().push(stat.pid);
    }

    let mut found = Vec::new();
    let mut seen = BTreeSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(pid) = queue.pop_front() {
        if let Some(children) = by_parent.get(&pid) {
            for child in children {
                if seen.insert(*child) {
                    found.push(*child);
                    queue.push_back(*child);
                }
            }
        }
    }
    found
}

/// Live members of process group `pgid`. The kernel does not hand out a
/// pid that is still in use as a pgid, so a non-empty result always belongs
/// to the group we created.
pub fn group_members(pgid: u32) -> Vec<u32> {
    scan_proc()
        .into_iter()
        .filter(|stat| stat.pgrp == pgid && stat.state != 'Z')
        .map(|stat| stat.pid)
        .collect()
}

fn is_group_leader(pid: u32) -> bool {
    let Some(raw) = as_raw_pid(pid) else {
        return false;
    };
    let pgid = unsafe { libc::getpgid(raw) };
    pgid == raw
}

fn send_signal(pid: u32, signal: c_int) {
    let Some(raw) = as_raw_pid(pid) else {
        return;
    };
    if unsafe { libc::kill(raw, signal) } != 0 {
        log_signal_error(pid, signal, "process");
    }
}

fn send_signal_group(pgid: u32, signal: c_int) {
    let Some(raw) = as_raw_pid(pgid) else {
        return;
    };
    if unsafe { libc::kill(-raw, signal) } != 0 {
        log_signal_error(pgid, signal, "process group");
    }
}

fn log_signal_error(pid: u32, signal: c_int, target: &str) {
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        trace!(pid, signal, target, "already gone");
    } else {
        warn!(pid, signal, target, error = %err, "failed to send signal");
    }
}

fn as_raw_pid(pid: u32) -> Option<libc::pid_t> {
    libc::pid_t::try_from(pid).ok().filter(|p| *p > 0)
}

#[derive(Debug, Clone, Copy)]
struct ProcStat {
    pid: u32,
    state: char,
    ppid: u32,
    pgrp: u32,
}

fn proc_exists(pid: u32) -> bool {
    fs::metadata(format!("/proc/{pid}")).is_ok()
}

fn read_stat(pid: u32) -> Option<ProcStat> {
    let contents = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_stat(&contents)
}

/// Parse `/proc/<pid>/stat`. The command name may contain spaces and
/// parentheses, so fields are read after the last `)`.
fn parse_stat(contents: &str) -> Option<ProcStat> {
    let open = contents.find('(')?;
    let close = contents.rfind(')')?;
    let pid = contents[..open].trim().parse().ok()?;
    let mut rest = contents[close + 1..].split_whitespace();
    let state = rest.next()?.chars().next()?;
    let ppid = rest.next()?.parse().ok()?;
    let pgrp = rest.next()?.parse().ok()?;
    Some(ProcStat {
        pid,
        state,
        ppid,
        pgrp,
    })
}

fn scan_proc() -> Vec<ProcStat> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .filter_map(read_stat)
        .collect()
}
