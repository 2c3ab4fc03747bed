// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use nix::unistd::Pid;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;

/// Result of an exclusive-create copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Created,
    /// The destination already existed; its contents were left untouched.
    Existed,
}

/// Copy `src` to `dst`, creating the destination exclusively.
///
/// Workers racing on identical fingerprint-encoding filenames rely on the
/// kernel's exclusive create to decide the winner; the loser sees
/// [`CopyOutcome::Existed`] and must never overwrite.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<CopyOutcome> {
    let mut out = match OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(CopyOutcome::Existed),
        Err(e) => return Err(e),
    };
    let mut input = File::open(src)?;

    // procfs and pipe-backed inputs report a zero length, so a plain
    // fs::copy length probe can't be trusted; stream through a buffer.
    const BUFFER_LEN: usize = 8192;
    let mut buffer = [0u8; BUFFER_LEN];
    loop {
        let read_count = input.read(&mut buffer)?;
        if read_count == 0 {
            break;
        }
        out.write_all(&buffer[..read_count])?;
    }
    out.flush()?;
    Ok(CopyOutcome::Created)
}

/// Snapshot `/proc/<pid>/maps` into `dst`.
pub fn copy_proc_maps(pid: Pid, dst: &Path) -> io::Result<()> {
    let mut maps = File::open(format!("/proc/{pid}/maps"))?;
    let mut out = File::create(dst)?;

    const BUFFER_LEN: usize = 8192;
    let mut buffer = [0u8; BUFFER_LEN];
    loop {
        let read_count = maps.read(&mut buffer)?;
        if read_count == 0 {
            break;
        }
        out.write_all(&buffer[..read_count])?;
    }
    out.flush()
}
