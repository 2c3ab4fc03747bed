// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::crash_info::Frame;
use crate::debugger::RegsWidth;
use crate::shared::constants::MAX_FRAMES;
use serde::{Deserialize, Serialize};

/// Everything the triage core knows about one crash event, assembled by
/// the dispatcher from registers, remote memory, the unwinder and the
/// siginfo of the stopped task (or from a parsed sanitizer report).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashContext {
    /// Task the event was observed on.
    pub tid: libc::pid_t,
    /// Delivered signal; zero on the sanitizer-exit path.
    pub signum: i32,
    pub si_code: i32,
    pub fault_addr: u64,
    /// True when the signal was user-generated rather than fault-raised.
    pub from_user: bool,
    pub pc: u64,
    pub status_reg: u64,
    pub width: RegsWidth,
    /// Sanitized instruction text; safe to embed in filenames.
    pub instr: String,
    pub frames: Vec<Frame>,
    pub hash: u64,
}

impl CrashContext {
    pub fn new(tid: libc::pid_t) -> Self {
        Self {
            tid,
            signum: 0,
            si_code: 0,
            fault_addr: 0,
            from_user: false,
            pc: 0,
            status_reg: 0,
            width: RegsWidth::Unknown,
            instr: String::new(),
            frames: Vec::new(),
            hash: 0,
        }
    }

    /// Append a frame, silently dropping anything past the cap.
    pub fn push_frame(&mut self, frame: Frame) {
        if self.frames.len() < MAX_FRAMES {
            self.frames.push(frame);
        }
    }

    /// True when any frame's symbol contains one of `patterns`
    /// (substring match, as the policy lists are written by hand).
    pub fn any_symbol_matches(&self, patterns: &[String]) -> bool {
        self.frames.iter().any(|frame| {
            frame
                .symbol
                .as_deref()
                .map(|symbol| patterns.iter().any(|pattern| symbol.contains(pattern)))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_cap() {
        let mut ctx = CrashContext::new(1234);
        for i in 0..(MAX_FRAMES as u64 + 10) {
            ctx.push_frame(Frame::from_pc(i));
        }
        assert_eq!(ctx.frames.len(), MAX_FRAMES);
    }

    #[test]
    fn test_symbol_matching_is_substring() {
        let mut ctx = CrashContext::new(1);
        let mut frame = Frame::from_pc(0x1000);
        frame.set_symbol("libfoo::do_parse");
        ctx.push_frame(frame);

        assert!(ctx.any_symbol_matches(&["do_parse".to_string()]));
        assert!(ctx.any_symbol_matches(&["libfoo".to_string()]));
        assert!(!ctx.any_symbol_matches(&["other".to_string()]));
        assert!(!ctx.any_symbol_matches(&[]));
    }
}
