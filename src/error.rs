//! Error types produced by the process supervisor.

use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

/// Failure to create a child process.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// `fork` itself failed. The host is out of processes or memory, so the
    /// interpreter treats this as unrecoverable.
    #[error("fork failed: {0}")]
    ForkFailed(Errno),
    /// The program path or one of the arguments can't be passed to `execv`.
    #[error("invalid argument {0:?}: contains a NUL byte")]
    InvalidArgument(String),
}

impl SpawnError {
    /// Whether the interpreter should stop after reporting this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SpawnError::ForkFailed(_))
    }
}

/// `waitpid` failed for a reason other than an interrupted system call.
#[derive(Debug, Error)]
#[error("waitpid: {errno}")]
pub struct WaitError {
    pub pid: Pid,
    pub errno: Errno,
}

/// Failure to terminate a registered background process.
#[derive(Debug, Error)]
pub enum TerminateError {
    #[error("[{0}] is not a registered background process")]
    NotRegistered(Pid),
    #[error("Failure - Exterminate Error: {errno}")]
    SignalFailed { pid: Pid, errno: Errno },
}

/// Any failure of a foreground run.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Wait(#[from] WaitError),
}

impl SupervisorError {
    pub fn is_fatal(&self) -> bool {
        match self {
            SupervisorError::Spawn(e) => e.is_fatal(),
            SupervisorError::Wait(_) => false,
        }
    }
}

/// Returns true if `err` carries a spawn failure the interpreter can't survive.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    if let Some(e) = err.downcast_ref::<SpawnError>() {
        return e.is_fatal();
    }
    if let Some(e) = err.downcast_ref::<SupervisorError>() {
        return e.is_fatal();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_fork_failure_is_fatal() {
        assert!(SpawnError::ForkFailed(Errno::EAGAIN).is_fatal());
        assert!(!SpawnError::InvalidArgument("a\0b".to_string()).is_fatal());

        let wait = SupervisorError::Wait(WaitError {
            pid: Pid::from_raw(1),
            errno: Errno::ECHILD,
        });
        assert!(!wait.is_fatal());
    }

    #[test]
    fn test_is_fatal_sees_through_anyhow() {
        let fatal: anyhow::Error =
            SupervisorError::from(SpawnError::ForkFailed(Errno::ENOMEM)).into();
        assert!(is_fatal(&fatal));

        let plain = anyhow::anyhow!("Missing program to run. Please try again");
        assert!(!is_fatal(&plain));
    }
}
