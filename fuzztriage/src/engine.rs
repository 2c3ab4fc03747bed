// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Seams for the external collaborators the triage core drives but does
//! not implement: the stack unwinder, the symbol resolver and the
//! disassembler. The surrounding harness plugs in real implementations;
//! the built-in ones below keep the core usable (and testable) without
//! them.

use crate::crash_info::Frame;
use nix::unistd::Pid;

/// Produces an ordered backtrace (root frame first) for a stopped task.
pub trait Unwinder: Send + Sync {
    fn unwind(&self, tid: Pid) -> Vec<Frame>;
}

/// Fills symbol/line information into frames in place. A no-op where
/// symbols are unavailable.
pub trait SymbolResolver: Send + Sync {
    fn resolve(&self, tid: Pid, frames: &mut [Frame]);
}

/// Renders the instruction at the start of `bytes` as mnemonic + operands.
/// `thumb` is only meaningful for 32-bit ARM tasks.
pub trait Disassembler: Send + Sync {
    fn disasm(&self, tid: Pid, bytes: &[u8], thumb: bool) -> Option<String>;
}

/// Unwinder that never produces frames; the dispatcher then falls back to
/// the register PC.
pub struct NullUnwinder;

impl Unwinder for NullUnwinder {
    fn unwind(&self, _tid: Pid) -> Vec<Frame> {
        Vec::new()
    }
}

/// Resolver for targets without symbol information.
pub struct NullResolver;

impl SymbolResolver for NullResolver {
    fn resolve(&self, _tid: Pid, _frames: &mut [Frame]) {}
}

/// Fallback "disassembler" rendering the raw opcode bytes as hex. Keeps
/// instruction text meaningful for dedup even when no real disassembler
/// is linked in.
pub struct RawBytesDisassembler;

impl Disassembler for RawBytesDisassembler {
    fn disasm(&self, _tid: Pid, bytes: &[u8], _thumb: bool) -> Option<String> {
        if bytes.is_empty() {
            return None;
        }
        let rendered: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Some(rendered.join(" "))
    }
}
