// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Persisting an admitted crash: the input copy under a
//! fingerprint-encoding filename, the human-readable report next to it,
//! and the optional memory-map snapshot.

use crate::crash_info::{signal_name, CrashContext};
use crate::debugger::format_pc;
use crate::sanitizer::{SanOperation, SanitizerKind};
use crate::shared::configuration::TriageConfig;
use crate::shared::constants::{DYNFILE_RESCAN_ITERATIONS, MAPS_EXTENSION, REPORT_EXTENSION};
use crate::shared::counters::GlobalCounters;
use crate::shared::fs::{copy_file, copy_proc_maps, CopyOutcome};
use crate::triage::WorkerState;
use nix::unistd::Pid;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// How the crash was detected; decides the filename prefix and the report
/// records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashKind {
    Signal { signum: i32, si_code: i32 },
    Sanitizer {
        kind: SanitizerKind,
        operation: SanOperation,
    },
}

/// Result of a persistence attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved(PathBuf),
    /// Another worker (or an earlier run) already captured this bug; the
    /// destination existed and nothing was written.
    Duplicate(PathBuf),
    /// Filesystem failure; logged, worker filename cleared so peers retry.
    Failed,
}

/// Render an address `%p`-style: `(nil)` for NULL, unpadded hex otherwise.
fn format_ptr(addr: u64) -> String {
    if addr == 0 {
        "(nil)".to_string()
    } else {
        format!("{addr:#x}")
    }
}

/// Build the artifact filename for an admitted crash.
///
/// Three cases:
/// - dry-run + verifier: the input's original name, for replay comparison;
/// - unique mode with a usable fingerprint: the name encodes the whole
///   fingerprint and nothing else, so identical bugs collide on purpose;
/// - otherwise: the fingerprint plus a timestamp and PID, so nothing
///   collides.
pub fn crash_filename(
    config: &TriageConfig,
    worker: &WorkerState,
    ctx: &CrashContext,
    kind: &CrashKind,
    unique: bool,
) -> PathBuf {
    if config.is_dry_run() && config.use_verifier() {
        let orig = Path::new(&worker.input_file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        return config.work_dir().join(orig);
    }

    let mut pc = ctx.pc;
    let mut addr = ctx.fault_addr;
    if config.disable_randomization() {
        pc = 0;
        addr = 0;
    }
    // A user-generated signal carries whatever was in the sender's union
    // slot, not a fault address.
    if ctx.from_user {
        addr = 0;
    }

    let mut name = match kind {
        CrashKind::Signal { signum, si_code } => format!(
            "{}.PC.{}.STACK.{:x}.CODE.{}.ADDR.{}.INSTR.{}",
            signal_name(*signum),
            format_pc(pc, ctx.width),
            ctx.hash,
            si_code,
            format_ptr(addr),
            ctx.instr,
        ),
        CrashKind::Sanitizer { kind, operation } => format!(
            "{}.PC.{}.STACK.{:x}.CODE.{}.ADDR.{}",
            kind.tag(),
            format_pc(pc, ctx.width),
            ctx.hash,
            operation.as_str(),
            format_ptr(addr),
        ),
    };

    if !unique {
        let stamp = chrono::Local::now().format("%Y-%m-%d.%H:%M:%S");
        name.push_str(&format!(".{stamp}.{}", ctx.tid));
    }
    name.push('.');
    name.push_str(config.file_extension());
    config.work_dir().join(name)
}

/// Copy the crashing input into the workspace and emit the report.
///
/// The copy uses exclusive create: when the destination exists, the bug
/// was already captured, the worker's filename is cleared (so the
/// verifier recognises the duplicate) and no report is written.
pub fn persist_crash(
    config: &TriageConfig,
    counters: &GlobalCounters,
    worker: &mut WorkerState,
    ctx: &CrashContext,
    kind: &CrashKind,
    unique: bool,
) -> PersistOutcome {
    let path = crash_filename(config, worker, ctx, kind, unique);
    worker.crash_file = path.to_string_lossy().into_owned();

    match copy_file(Path::new(&worker.input_file), &path) {
        Ok(CopyOutcome::Existed) => {
            log::info!("crash already captured as {}", path.display());
            worker.crash_file.clear();
            PersistOutcome::Duplicate(path)
        }
        Err(e) => {
            log::error!("couldn't save crash input to {}: {e}", path.display());
            worker.crash_file.clear();
            PersistOutcome::Failed
        }
        Ok(CopyOutcome::Created) => {
            counters.count_unique_crash();
            counters.reset_dynfile_countdown(DYNFILE_RESCAN_ITERATIONS);
            log::info!("crash saved as {}", path.display());

            if let Err(e) = write_report_file(&path, worker, ctx, kind) {
                log::error!("couldn't write report next to {}: {e}", path.display());
            }
            if config.save_maps() {
                let maps_path = path.with_extension(MAPS_EXTENSION);
                if let Err(e) = copy_proc_maps(Pid::from_raw(ctx.tid), &maps_path) {
                    log::warn!("couldn't snapshot maps of {}: {e}", ctx.tid);
                }
            }
            PersistOutcome::Saved(path)
        }
    }
}

fn write_report_file(
    crash_path: &Path,
    worker: &WorkerState,
    ctx: &CrashContext,
    kind: &CrashKind,
) -> std::io::Result<()> {
    let report_path = crash_path.with_extension(REPORT_EXTENSION);
    let mut w = BufWriter::new(File::create(report_path)?);
    emit_report(&mut w, worker, ctx, kind, crash_path)?;
    w.flush()
}

/// Emit the plain-text report: newline-terminated `KEY: VALUE` records in
/// a fixed order, ending with the STACK table.
pub fn emit_report(
    w: &mut impl Write,
    worker: &WorkerState,
    ctx: &CrashContext,
    kind: &CrashKind,
    crash_path: &Path,
) -> std::io::Result<()> {
    writeln!(w, "ORIG_FNAME: {}", worker.input_file)?;
    writeln!(w, "FUZZ_FNAME: {}", crash_path.display())?;
    writeln!(w, "PID: {}", ctx.tid)?;
    match kind {
        CrashKind::Signal { signum, .. } => {
            writeln!(w, "SIGNAL: {signum} ({})", signal_name(*signum))?;
        }
        CrashKind::Sanitizer { kind, operation } => {
            writeln!(w, "EXIT CODE: {} ({})", kind.exit_code(), kind.tag())?;
            writeln!(w, "OPERATION: {}", operation.as_str())?;
        }
    }
    writeln!(w, "FAULT ADDRESS: {}", format_ptr(ctx.fault_addr))?;
    if matches!(kind, CrashKind::Signal { .. }) {
        writeln!(w, "INSTRUCTION: {}", ctx.instr)?;
    }
    writeln!(w, "STACK HASH: {:016x}", ctx.hash)?;
    writeln!(w, "STACK:")?;
    for frame in &ctx.frames {
        writeln!(w, "{}", frame.report_line())?;
    }
    Ok(())
}
