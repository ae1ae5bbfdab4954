// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::common::ProcessId;

/// Converts to a signal target, refusing pid 0 and anything that would turn
/// into a negative (process group) pid.
fn signal_target(pid: ProcessId) -> Option<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

/// Probes `pid` with the null signal. A process we may not signal still exists.
pub fn signal_exists(pid: ProcessId) -> bool {
    let Some(target) = signal_target(pid) else {
        return false;
    };
    matches!(kill(target, None), Ok(()) | Err(Errno::EPERM))
}

pub fn signal_kill(pid: ProcessId) -> bool {
    signal_target(pid).is_some_and(|target| kill(target, Signal::SIGKILL).is_ok())
}

pub fn current_parent_id() -> ProcessId {
    std::os::unix::process::parent_id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_target_rejects_groups() {
        assert!(signal_target(0).is_none());
        assert!(signal_target(u32::MAX).is_none());
        assert_eq!(signal_target(1), Some(Pid::from_raw(1)));
    }

    #[test]
    fn test_current_process_exists() {
        assert!(signal_exists(std::process::id()));
        assert!(!signal_exists(0));
        assert!(!signal_exists(u32::MAX - 1));
    }

    #[test]
    fn test_kill_refuses_pid_zero() {
        assert!(!signal_kill(0));
    }
}
