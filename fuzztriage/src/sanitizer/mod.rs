// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod report;

pub use report::*;

use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Process exit codes reserved for the memory-safety runtimes linked into
/// the target. The fuzzer passes these to the runtimes through their
/// option strings (`exitcode=...`), so observing one from a child means a
/// sanitizer detected a violation and wrote a report file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromPrimitive, ToPrimitive,
)]
#[repr(i32)]
pub enum SanitizerKind {
    Msan = 103,
    Asan = 104,
    Ubsan = 105,
}

impl SanitizerKind {
    pub fn from_exit_code(code: i32) -> Option<Self> {
        num_traits::FromPrimitive::from_i32(code)
    }

    /// Tag used as the crash filename prefix and in report records.
    pub fn tag(&self) -> &'static str {
        match self {
            SanitizerKind::Msan => "MSAN",
            SanitizerKind::Asan => "ASAN",
            SanitizerKind::Ubsan => "UBSAN",
        }
    }

    pub fn exit_code(&self) -> i32 {
        *self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(SanitizerKind::from_exit_code(103), Some(SanitizerKind::Msan));
        assert_eq!(SanitizerKind::from_exit_code(104), Some(SanitizerKind::Asan));
        assert_eq!(
            SanitizerKind::from_exit_code(105),
            Some(SanitizerKind::Ubsan)
        );
        assert_eq!(SanitizerKind::from_exit_code(0), None);
        assert_eq!(SanitizerKind::from_exit_code(1), None);
        assert_eq!(SanitizerKind::from_exit_code(139), None);
    }

    #[test]
    fn test_tags() {
        assert_eq!(SanitizerKind::Asan.tag(), "ASAN");
        assert_eq!(SanitizerKind::Msan.tag(), "MSAN");
        assert_eq!(SanitizerKind::Ubsan.tag(), "UBSAN");
    }
}
