// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::DebuggerError;
use nix::unistd::Pid;
use std::path::PathBuf;

/// List the task IDs making up process `pid` by reading
/// `/proc/<pid>/task`.
///
/// The listing is a point-in-time snapshot: tasks may appear or vanish
/// between enumeration and any subsequent ptrace operation, and callers
/// must tolerate both. An error means the process itself is gone.
pub fn list_tasks(pid: Pid) -> Result<Vec<Pid>, DebuggerError> {
    let task_dir = PathBuf::from(format!("/proc/{pid}/task"));
    let entries = std::fs::read_dir(&task_dir).map_err(|source| DebuggerError::TaskList {
        pid,
        source,
    })?;

    let mut tids = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("skipping unreadable task entry under {task_dir:?}: {e}");
                continue;
            }
        };
        // Non-numeric names never occur under task/, but a task that died
        // mid-listing can surface as a read error; skip quietly.
        if let Some(tid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<libc::pid_t>().ok())
        {
            tids.push(Pid::from_raw(tid));
        }
    }
    Ok(tids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_own_tasks() {
        let tids = list_tasks(Pid::this()).unwrap();
        assert!(!tids.is_empty());
        assert!(tids.contains(&Pid::this()));
    }

    #[test]
    fn test_list_sees_spawned_thread() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            // Hold the thread alive until the listing is done.
            rx.recv().unwrap();
        });
        let tids = list_tasks(Pid::this()).unwrap();
        assert!(tids.len() >= 2);
        tx.send(()).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_vanished_process_is_an_error() {
        // PID 0 has no /proc entry from a tracer's point of view.
        list_tasks(Pid::from_raw(0)).unwrap_err();
    }
}
