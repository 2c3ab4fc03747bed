// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::crash_info::Frame;
use crate::shared::constants::{MAX_FRAMES, SAN_LOG_PREFIX};
use anyhow::Context;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

/// Memory operation the sanitizer attributed the fault to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SanOperation {
    Read,
    Write,
    #[default]
    Unknown,
}

impl SanOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SanOperation::Read => "READ",
            SanOperation::Write => "WRITE",
            SanOperation::Unknown => "UNKNOWN",
        }
    }
}

/// Everything extracted from one sanitizer report file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SanitizerReport {
    pub frames: Vec<Frame>,
    pub fault_addr: u64,
    pub operation: SanOperation,
}

impl SanitizerReport {
    /// PC of the innermost frame; zero when the report carried none.
    pub fn pc(&self) -> u64 {
        self.frames.first().map(|f| f.pc).unwrap_or(0)
    }
}

/// The parser walks the report line by line through three states; the
/// text between the header and the first empty line after a frame is the
/// only part that matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    HeaderSearch,
    FrameCollect,
    Done,
}

/// Parse `<work_dir>/<prefix>.<pid>`, consuming the file on success.
///
/// `Ok(None)` means the file does not exist *yet*: sanitizer reports are
/// written asynchronously by whichever task trips the violation, so the
/// caller must leave its per-iteration state untouched and let a sibling
/// task retry.
pub fn parse_report(work_dir: &Path, pid: Pid) -> anyhow::Result<Option<SanitizerReport>> {
    let path = work_dir.join(format!("{SAN_LOG_PREFIX}.{pid}"));
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("no sanitizer report at {path:?} yet");
            return Ok(None);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to open {}", path.display()));
        }
    };

    let mut report = SanitizerReport::default();
    let mut state = ParseState::HeaderSearch;
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        state = process_line(&mut report, pid, &line, state);
        if state == ParseState::Done {
            break;
        }
    }

    // Each report is consumed exactly once so sibling tasks of the same
    // process don't double-save the crash.
    if let Err(e) = std::fs::remove_file(&path) {
        log::warn!("couldn't unlink consumed report {path:?}: {e}");
    }
    log::debug!(
        "parsed sanitizer report for pid {pid}: {} frames, fault addr {:#x}",
        report.frames.len(),
        report.fault_addr
    );
    Ok(Some(report))
}

fn process_line(
    report: &mut SanitizerReport,
    pid: Pid,
    line: &str,
    state: ParseState,
) -> ParseState {
    match state {
        ParseState::HeaderSearch => {
            if line.contains(&format!("=={pid}==ERROR: AddressSanitizer:")) {
                report.fault_addr = extract_fault_addr(line);
                ParseState::FrameCollect
            } else {
                ParseState::HeaderSearch
            }
        }
        ParseState::FrameCollect => {
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                return if report.frames.is_empty() {
                    ParseState::FrameCollect
                } else {
                    ParseState::Done
                };
            }
            if trimmed.starts_with('#') {
                if let Some(frame) = parse_frame_line(trimmed) {
                    if report.frames.len() < MAX_FRAMES {
                        report.frames.push(frame);
                    }
                }
            } else if report.operation == SanOperation::Unknown {
                report.operation = extract_operation(trimmed, report.fault_addr);
            }
            ParseState::FrameCollect
        }
        ParseState::Done => ParseState::Done,
    }
}

/// Pull the hex literal following `address ` out of the header line.
fn extract_fault_addr(line: &str) -> u64 {
    let Some(idx) = line.find("address ") else {
        return 0;
    };
    let rest = &line[idx + "address ".len()..];
    rest.split_whitespace()
        .next()
        .and_then(parse_hex)
        .unwrap_or(0)
}

/// `READ of size 8 at 0x... thread T0` / `WRITE of size ...`.
/// The line has to name the crash address; a prefix match alone is how
/// unrelated notes would get misclassified.
fn extract_operation(line: &str, fault_addr: u64) -> SanOperation {
    let op = if line.starts_with("READ") {
        SanOperation::Read
    } else if line.starts_with("WRITE") {
        SanOperation::Write
    } else {
        return SanOperation::Unknown;
    };
    if fault_addr != 0 && !line.contains(&format!("{fault_addr:#x}")) {
        return SanOperation::Unknown;
    }
    op
}

/// Frame line shape: `#N 0xADDR (MODULE+0xOFFSET)`. The module part is
/// optional; a bare PC still makes a usable frame.
fn parse_frame_line(line: &str) -> Option<Frame> {
    let mut tokens = line.split_whitespace();
    let index = tokens.next()?;
    if !index
        .strip_prefix('#')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let pc = parse_hex(tokens.next()?)?;
    let mut frame = Frame::from_pc(pc);

    if let Some(location) = tokens.next() {
        let location = location
            .strip_prefix('(')
            .and_then(|l| l.strip_suffix(')'))
            .unwrap_or(location);
        if let Some((module, offset)) = location.rsplit_once('+') {
            if !module.is_empty() {
                frame.set_symbol(module);
            }
            frame.offset = parse_hex(offset).unwrap_or(0);
        }
    }
    Some(frame)
}

fn parse_hex(token: &str) -> Option<u64> {
    let digits = token.strip_prefix("0x").unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}
