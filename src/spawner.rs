use crate::error::SpawnError;
use nix::unistd::{self, ForkResult, Pid};
use std::ffi::CString;
use std::ptr;
use tracing::{debug, warn};

/// Exit status of a child whose `execv` failed.
pub const EXEC_FAILED_STATUS: i32 = 127;

/// A freshly spawned child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRef {
    pid: Pid,
}

impl ChildRef {
    pub fn pid(&self) -> Pid {
        self.pid
    }
}

fn to_cstring(s: &str) -> Result<CString, SpawnError> {
    CString::new(s).map_err(|_| SpawnError::InvalidArgument(s.to_owned()))
}

/// Start `program` in a new process with argv `[program, args...]`.
///
/// The child replaces its image with `execv`: no shell, no PATH search. If the
/// exec fails the child exits with [`EXEC_FAILED_STATUS`] and the parent still
/// gets a [`ChildRef`]; it learns about the failure only by waiting.
pub fn spawn(program: &str, args: &[String]) -> Result<ChildRef, SpawnError> {
    let path = to_cstring(program)?;
    let argv = std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(to_cstring)
        .collect::<Result<Vec<_>, _>>()?;

    // Built before forking: the child may only call async-signal-safe functions,
    // so it must not allocate.
    let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|a| a.as_ptr()).collect();
    argv_ptrs.push(ptr::null());

    // SAFETY: the child branch only calls execv and _exit.
    match unsafe { unistd::fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!(pid = %child, program, ?args, "spawned");
            Ok(ChildRef { pid: child })
        }
        Ok(ForkResult::Child) => unsafe {
            libc::execv(path.as_ptr(), argv_ptrs.as_ptr());
            libc::_exit(EXEC_FAILED_STATUS)
        },
        Err(errno) => {
            warn!(%errno, program, "fork failed");
            Err(SpawnError::ForkFailed(errno))
        }
    }
}
