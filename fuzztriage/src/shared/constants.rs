// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits and reserved values shared between the analysis and persistence
//! sides of the triage core.

/// Upper bound on the number of stack frames kept per crash.
/// Deeper unwinds are truncated; the fingerprint only ever looks at the
/// first few frames anyway.
pub const MAX_FRAMES: usize = 80;

/// Upper bound on the sanitized instruction-text string. The string is
/// embedded verbatim in crash filenames, so it has to stay short.
pub const MAX_INSTR_LEN: usize = 64;

/// Upper bound on a single symbol or module name copied out of the
/// unwinder or a sanitizer report.
pub const MAX_SYMBOL_LEN: usize = 256;

/// Reserved bit in the 64-bit callstack hash marking a single-frame
/// backtrace. The mixing function never sets this bit, so downstream
/// tooling can test it unambiguously.
pub const SINGLE_FRAME_MASK: u64 = 1u64 << 63;

/// Number of innermost frames that participate in the fingerprint when the
/// configuration does not override it.
pub const DEFAULT_MAJOR_FRAMES: usize = 7;

/// Refill value for the dynamic-file countdown. A fresh unique crash
/// resets the countdown so the corpus is rescanned soon after.
pub const DYNFILE_RESCAN_ITERATIONS: u64 = 1024;

/// Filename prefix of the per-task sanitizer report. The sanitizer runtime
/// appends `.<pid>`; the parser looks for `<work_dir>/<prefix>.<pid>`.
pub const SAN_LOG_PREFIX: &str = "sanitizer.log";

/// Extension of the human-readable report written next to a crash artifact.
pub const REPORT_EXTENSION: &str = "report";

/// Extension of the optional `/proc/<pid>/maps` snapshot.
pub const MAPS_EXTENSION: &str = "maps";
