// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Crash triage and deduplication core of a coverage-guided fuzzing
//! harness.
//!
//! When a fuzzed child stops with a fatal signal or exits with a
//! sanitizer-reserved status, this crate attaches to and steers the child
//! and its tasks, reconstructs the crash context (program counter,
//! instruction text, backtrace, fault address), reduces it to a stable
//! 64-bit fingerprint, decides whether the crash is novel, listed or
//! duplicate, and persists the input plus a human-readable report under a
//! filename that encodes the fingerprint.
//!
//! Input mutation, scheduling, process spawning and the heavyweight
//! engines (unwinder, symbolizer, disassembler) live outside; the engines
//! plug in through the traits in [`engine`].

mod api;
pub mod crash_info;
pub mod debugger;
pub mod engine;
pub mod sanitizer;
pub mod shared;
pub mod triage;

pub use api::Triage;
pub use crash_info::{CrashContext, Frame};
pub use sanitizer::{SanOperation, SanitizerKind};
pub use shared::configuration::TriageConfig;
pub use shared::counters::{CounterSnapshot, GlobalCounters};
pub use triage::{CrashKind, PersistOutcome, Verdict, WorkerState};
