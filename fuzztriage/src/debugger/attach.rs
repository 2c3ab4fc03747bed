// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::{threads, DebuggerError};
use nix::errno::Errno;
use nix::sys::ptrace::{self, Options};
use nix::sys::signal::kill;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// A seized debugee: the root task plus every task that was visible at
/// attach time. Tasks spawned later are auto-attached by the kernel via
/// the clone/fork/vfork trace options, so the dispatcher must tolerate
/// tids it never saw here.
#[derive(Debug)]
pub struct TargetProcess {
    pub pid: Pid,
    pub tasks: Vec<Pid>,
}

/// Options requested at seize time: follow child creation so new tasks
/// are auto-attached, and observe task exits before they are reaped.
fn seize_options() -> Options {
    Options::PTRACE_O_TRACECLONE
        | Options::PTRACE_O_TRACEFORK
        | Options::PTRACE_O_TRACEVFORK
        | Options::PTRACE_O_TRACEEXIT
}

/// Seize `pid` and every task it currently has.
///
/// Per-task failures are tolerated: a task that died between enumeration
/// and seize is logged and skipped, and the process remains usable with a
/// partial attach. Only a failure to seize the root task is fatal.
pub fn attach(pid: Pid) -> Result<TargetProcess, DebuggerError> {
    ptrace::seize(pid, seize_options())
        .map_err(|source| DebuggerError::Seize { tid: pid, source })?;

    let tids = threads::list_tasks(pid)?;
    let mut tasks = vec![pid];
    for tid in tids {
        if tid == pid {
            continue;
        }
        match ptrace::seize(tid, seize_options()) {
            Ok(()) => tasks.push(tid),
            Err(e) => {
                log::warn!("couldn't seize task {tid} of process {pid}: {e}");
            }
        }
    }
    log::debug!("attached to process {pid} ({} tasks)", tasks.len());
    Ok(TargetProcess { pid, tasks })
}

/// Detach from `pid` and all of its tasks.
///
/// The task list is re-enumerated because tasks may have been spawned (and
/// auto-attached) since the original seize. Each task is interrupted and
/// awaited before the detach request, which the kernel requires for seized
/// tracees that are currently running.
pub fn detach(pid: Pid) {
    // The process may be long gone; that makes detach a no-op.
    if kill(pid, None) == Err(Errno::ESRCH) {
        log::debug!("process {pid} already gone, nothing to detach");
        return;
    }

    let tids = match threads::list_tasks(pid) {
        Ok(tids) => tids,
        Err(e) => {
            log::debug!("couldn't re-enumerate {pid} for detach: {e}");
            return;
        }
    };

    for tid in tids {
        if let Err(e) = ptrace::interrupt(tid) {
            log::debug!("couldn't interrupt task {tid}: {e}");
            continue;
        }
        if !wait_for_stop(tid) {
            log::debug!("task {tid} never acknowledged the interrupt");
            continue;
        }
        match ptrace::detach(tid, None) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => log::warn!("couldn't detach from task {tid}: {e}"),
        }
    }
}

/// Block until `tid` reports a stop. Interrupted waits are retried; any
/// terminal status (exit, signal death) fails.
pub fn wait_for_stop(tid: Pid) -> bool {
    loop {
        match waitpid(tid, Some(WaitPidFlag::__WALL)) {
            Ok(WaitStatus::Stopped(..)) | Ok(WaitStatus::PtraceEvent(..)) => return true,
            Ok(status) => {
                log::debug!("task {tid} reached {status:?} while waiting for a stop");
                return false;
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                log::debug!("wait for task {tid} failed: {e}");
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_vanished_process_fails() {
        // Find a pid that doesn't exist; wrapping pid_max is good enough.
        let bogus = Pid::from_raw(i32::MAX - 1);
        attach(bogus).unwrap_err();
    }

    #[test]
    fn test_detach_vanished_process_is_noop() {
        detach(Pid::from_raw(i32::MAX - 1));
    }

    #[test]
    fn test_seize_options_follow_children_and_exits() {
        let opts = seize_options();
        assert!(opts.contains(Options::PTRACE_O_TRACECLONE));
        assert!(opts.contains(Options::PTRACE_O_TRACEFORK));
        assert!(opts.contains(Options::PTRACE_O_TRACEVFORK));
        assert!(opts.contains(Options::PTRACE_O_TRACEEXIT));
    }
}
