// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::{is_thumb, memory, CpuState, RegsWidth};
use crate::engine::Disassembler;
use crate::shared::constants::MAX_INSTR_LEN;
use nix::unistd::Pid;

/// Longest instruction encoding the target architecture can produce.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub const MAX_INSTR_BYTES: usize = 16;
#[cfg(target_arch = "aarch64")]
pub const MAX_INSTR_BYTES: usize = 8;
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
pub const MAX_INSTR_BYTES: usize = 4;

/// Text placed in the crash record when no PC is available.
pub const INSTR_UNKNOWN: &str = "[UNKNOWN]";
/// Text placed in the crash record when the PC points at unmapped memory.
pub const INSTR_NOT_MMAPED: &str = "[NOT_MMAPED]";

/// Produce the sanitized instruction text for the crash site.
///
/// The PC is canonicalised in place (the THUMB low bit is dropped) so the
/// caller reuses the same address for unwinding and reporting.
pub fn read_instruction_text(
    disassembler: &dyn Disassembler,
    tid: Pid,
    pc: &mut u64,
    cpu: &CpuState,
) -> String {
    if *pc == 0 || cpu.width == RegsWidth::Unknown {
        return INSTR_UNKNOWN.to_string();
    }

    let thumb = is_thumb(cpu.width, cpu.status_reg);
    if thumb {
        *pc &= !1;
    }

    let bytes = memory::read_mem(tid, *pc, MAX_INSTR_BYTES);
    if bytes.is_empty() {
        return INSTR_NOT_MMAPED.to_string();
    }

    match disassembler.disasm(tid, &bytes, thumb) {
        Some(text) => sanitize_instruction(&text),
        None => INSTR_UNKNOWN.to_string(),
    }
}

/// Replace everything that is not a printable non-separator character with
/// `_`, and bound the length. The result is safe to embed in filenames.
pub fn sanitize_instruction(text: &str) -> String {
    let mut out: String = text
        .chars()
        .take(MAX_INSTR_LEN)
        .map(|c| {
            if c.is_ascii_graphic() && c != '/' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    out.truncate(MAX_INSTR_LEN);
    out
}
