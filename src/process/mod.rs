//! Process launching and lifecycle helpers
//!
//! Children are started in their own process group on Unix so that a timed
//! out node can be killed together with everything it spawned.

pub mod runner;
pub mod stream;

pub use runner::{LaunchError, ProcessRunner, RunOutcome, RunRequest};
pub use stream::{StreamConsumer, StreamMode};

use std::process::Child;

/// Check if a process with the given PID is alive
///
/// Sends the null signal: `EPERM` still means the process exists, `ESRCH`
/// means it does not.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };

    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Kill `child` and its whole process group, then reap it.
///
/// Falls back to killing only the child when the group cannot be signalled.
pub fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Ok(pgid) = i32::try_from(child.id()) {
            match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                Ok(()) => {
                    let _ = child.wait();
                    return;
                }
                Err(e) => {
                    tracing::debug!(pid = pgid, error = %e, "killpg failed, killing child only");
                }
            }
        }
    }

    // Ignore errors: the process may already have exited
    let _ = child.kill();
    let _ = child.wait();
}
