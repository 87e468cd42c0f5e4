/*!
 * Fork Launcher
 * Starts a real child with fork, redirects its streams and replaces its image
 */

use super::traits::ProcessLauncher;
use super::types::{ChildSetup, ExitReport, LaunchError, LaunchResult, Redirection};
use crate::core::limits::EXEC_FAILURE_STATUS;
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use std::ffi::CString;
use std::os::raw::c_char;
use tracing::{debug, info, warn};

/// Launches children with `fork` + `execvp`
///
/// Everything the child needs is prepared before forking; between `fork` and
/// `exec` the child only makes async-signal-safe calls and never returns into
/// the caller's code.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForkLauncher;

impl ForkLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for ForkLauncher {
    type Child = Pid;

    fn launch(&self, setup: ChildSetup<'_>) -> LaunchResult<Pid> {
        let ChildSetup {
            command,
            mut redirections,
        } = setup;

        let argv = command.to_argv()?;
        let mut argv_ptrs: Vec<*const c_char> = argv.iter().map(|arg| arg.as_ptr()).collect();
        argv_ptrs.push(std::ptr::null());

        // SAFETY: the child branch runs `exec_child`, which only performs
        // async-signal-safe calls on data allocated before this point.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => exec_child(&argv, &argv_ptrs, &mut redirections),
            Ok(ForkResult::Parent { child }) => {
                info!(
                    pid = child.as_raw(),
                    command = %command,
                    redirections = redirections.len(),
                    "Child launched"
                );
                Ok(child)
            }
            Err(errno) => {
                warn!(command = %command, error = %errno, "fork failed");
                Err(LaunchError::Fork { errno })
            }
        }
    }

    fn join(&self, child: Pid) -> LaunchResult<ExitReport> {
        loop {
            match waitpid(child, None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    debug!(pid = child.as_raw(), code, "Child exited");
                    return Ok(ExitReport::Exited(code));
                }
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    debug!(pid = child.as_raw(), signal = ?sig, "Child killed by signal");
                    return Ok(ExitReport::Signaled(sig as i32));
                }
                Ok(status) => {
                    debug!(pid = child.as_raw(), ?status, "Child reported non-terminal status");
                    return Ok(ExitReport::Unknown);
                }
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(LaunchError::Wait { errno }),
            }
        }
    }
}

/// Child side of the fork: wire the streams, then become the command
fn exec_child(
    argv: &[CString],
    argv_ptrs: &[*const c_char],
    redirections: &mut [Redirection<'_>],
) -> ! {
    for redirection in redirections.iter_mut() {
        if redirection
            .pipe
            .attach(redirection.end, redirection.stream)
            .is_err()
        {
            // SAFETY: terminating without running destructors or atexit hooks
            unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
        }
    }

    // SAFETY: the runtime ignores SIGPIPE and an ignored disposition survives
    // exec; the new image gets the default back.
    let _ = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) };

    // SAFETY: argv_ptrs is NUL-terminated and points into argv, which outlives
    // the call. execvp only returns on failure.
    unsafe {
        libc::execvp(argv[0].as_ptr(), argv_ptrs.as_ptr());
        libc::_exit(EXEC_FAILURE_STATUS)
    }
}
