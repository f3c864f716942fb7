//! Zombie reaping for processes that run as init

use std::io;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::trace;

/// Reclaim every terminated child without blocking.
///
/// Meant for a process acting as PID 1 in a container, where orphans are
/// re-parented to it. It also reaps children this crate is still tracking,
/// whose pipes will then report a wait error instead of their exit status.
pub fn reap() -> io::Result<()> {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return Ok(()),
            Ok(status) => trace!(pid = ?status.pid(), "Reaped zombie process"),
            // no more children to reap
            Err(Errno::ECHILD) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
