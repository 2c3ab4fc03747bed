// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::shared::constants::MAX_SYMBOL_LEN;
use serde::{Deserialize, Serialize};

/// A single stack level. Immutable once produced by the unwinder or the
/// sanitizer-report parser, except for the symbolization pass which fills
/// in the name fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Frame {
    /// Instruction address; zero when the producer could not recover one.
    pub pc: u64,
    /// Symbol or module name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Offset into the symbol or module.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: u64,
    /// Source line, when the resolver produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Frame {
    pub fn from_pc(pc: u64) -> Self {
        Self {
            pc,
            ..Self::default()
        }
    }

    /// Attach a symbol or module name, bounded so hostile report content
    /// can't balloon the crash record.
    pub fn set_symbol(&mut self, name: &str) {
        let mut name = name.to_string();
        if name.len() > MAX_SYMBOL_LEN {
            let mut cut = MAX_SYMBOL_LEN;
            while !name.is_char_boundary(cut) {
                cut -= 1;
            }
            name.truncate(cut);
        }
        self.symbol = Some(name);
    }

    /// Render this frame the way the report's STACK table expects it:
    /// ` <0x…> [SYMBOL + 0xOFFSET]`, with empty brackets when no symbol is
    /// known.
    pub fn report_line(&self) -> String {
        match &self.symbol {
            Some(symbol) => {
                format!(" <{:#018x}> [{} + {:#x}]", self.pc, symbol, self.offset)
            }
            None => format!(" <{:#018x}> []", self.pc),
        }
    }
}
