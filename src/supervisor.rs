//! Foreground and background execution, termination and repetition of
//! external programs.
//!
//! Every operation that touches background processes takes the
//! [`ProcessRegistry`] explicitly; the supervisor keeps no state of its own.

use crate::error::{SpawnError, SupervisorError, TerminateError, WaitError};
use crate::registry::ProcessRegistry;
use crate::spawner;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::fmt;
use tracing::{debug, info, warn};

/// How a child process changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    ExitedNormally(i32),
    KilledBySignal(i32),
    Stopped(i32),
}

impl Outcome {
    /// Map a `waitpid` status onto an outcome. Statuses that say nothing about
    /// the child's life (continued, still alive, ptrace events) give `None`.
    pub fn classify(status: WaitStatus) -> Option<Outcome> {
        match status {
            WaitStatus::Exited(_, code) => Some(Outcome::ExitedNormally(code)),
            WaitStatus::Signaled(_, sig, _) => Some(Outcome::KilledBySignal(sig as i32)),
            WaitStatus::Stopped(_, sig) => Some(Outcome::Stopped(sig as i32)),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Stopped(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::ExitedNormally(code) => write!(f, "Process exited with value {}", code),
            Outcome::KilledBySignal(sig) => write!(f, "Process exited due to signal {}", sig),
            Outcome::Stopped(sig) => write!(f, "Process was stopped by signal {}", sig),
        }
    }
}

/// Result of a bulk termination pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkTermination {
    /// Processes whose kill was confirmed.
    pub killed: usize,
    /// Processes whose kill failed; they are dropped from the registry anyway.
    pub failed: usize,
}

/// `waitpid` that retries when a signal interrupts it.
fn waitpid_restarting(pid: Pid, flags: Option<WaitPidFlag>) -> nix::Result<WaitStatus> {
    loop {
        match wait::waitpid(pid, flags) {
            Err(Errno::EINTR) => debug!(%pid, "waitpid interrupted, retrying"),
            other => return other,
        }
    }
}

/// Block until `pid` terminates.
///
/// Interrupted waits are retried. A stop is handed to `on_stop` and waiting
/// resumes, so the returned outcome is always terminal.
pub fn wait_for<F>(pid: Pid, mut on_stop: F) -> Result<Outcome, WaitError>
where
    F: FnMut(Outcome),
{
    loop {
        match waitpid_restarting(pid, Some(WaitPidFlag::WUNTRACED)) {
            Ok(status) => match Outcome::classify(status) {
                Some(outcome) if outcome.is_terminal() => {
                    debug!(%pid, ?outcome, "reaped foreground child");
                    return Ok(outcome);
                }
                Some(stopped) => {
                    debug!(%pid, ?stopped, "foreground child stopped, still waiting");
                    on_stop(stopped);
                }
                None => {}
            },
            Err(errno) => {
                warn!(%pid, %errno, "waitpid failed");
                return Err(WaitError { pid, errno });
            }
        }
    }
}

/// Run `program` and block until it finishes. The child is never registered.
pub fn run_foreground<F>(
    program: &str,
    args: &[String],
    on_stop: F,
) -> Result<Outcome, SupervisorError>
where
    F: FnMut(Outcome),
{
    let child = spawner::spawn(program, args)?;
    Ok(wait_for(child.pid(), on_stop)?)
}

/// Start `program` without waiting and record it in `registry`.
pub fn run_background(
    registry: &mut ProcessRegistry,
    program: &str,
    args: &[String],
) -> Result<Pid, SpawnError> {
    let child = spawner::spawn(program, args)?;
    registry.insert(child.pid());
    info!(pid = %child.pid(), program, "background process started");
    Ok(child.pid())
}

/// Start `count` background copies of `program`, one after another.
///
/// A non-positive `count` does nothing. Each new id goes to `on_spawn` as soon
/// as it is registered, so ids started before a failed fork are still seen.
/// Returns how many copies were started.
pub fn repeat<F>(
    registry: &mut ProcessRegistry,
    count: i64,
    program: &str,
    args: &[String],
    mut on_spawn: F,
) -> Result<usize, SpawnError>
where
    F: FnMut(Pid),
{
    let mut started = 0;
    for _ in 0..count.max(0) {
        on_spawn(run_background(registry, program, args)?);
        started += 1;
    }
    Ok(started)
}

/// SIGKILL `pid` and collect its status.
fn kill_and_reap(pid: Pid) -> Result<(), TerminateError> {
    signal::kill(pid, Signal::SIGKILL).map_err(|errno| {
        warn!(%pid, %errno, "kill failed");
        TerminateError::SignalFailed { pid, errno }
    })?;
    reap(pid);
    info!(%pid, "killed");
    Ok(())
}

fn reap(pid: Pid) {
    match waitpid_restarting(pid, None) {
        Ok(status) => debug!(%pid, ?status, "reaped"),
        // ECHILD: someone else already collected it.
        Err(errno) => debug!(%pid, %errno, "nothing to reap"),
    }
}

/// Kill one registered background process.
///
/// The registry is only modified when the signal was delivered.
pub fn terminate(registry: &mut ProcessRegistry, pid: Pid) -> Result<(), TerminateError> {
    if !registry.contains(pid) {
        return Err(TerminateError::NotRegistered(pid));
    }
    kill_and_reap(pid)?;
    registry.remove(pid);
    Ok(())
}

/// Kill every registered process, oldest first.
///
/// Works on the registry contents at call time. Failures don't stop the pass,
/// each result goes to `report`. The registry is empty afterwards regardless.
pub fn terminate_all<F>(registry: &mut ProcessRegistry, mut report: F) -> BulkTermination
where
    F: FnMut(Pid, &Result<(), TerminateError>),
{
    let mut summary = BulkTermination::default();
    for pid in registry.clear() {
        let result = kill_and_reap(pid);
        match result {
            Ok(()) => summary.killed += 1,
            Err(_) => summary.failed += 1,
        }
        report(pid, &result);
    }
    summary
}
