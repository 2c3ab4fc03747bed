// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::crash_info::Frame;
use crate::engine::{SymbolResolver, Unwinder};
use crate::shared::constants::MAX_FRAMES;
use nix::unistd::Pid;

/// Ordered backtrace of a stopped task, root frame first.
#[derive(Debug)]
pub struct CollectedStack {
    pub frames: Vec<Frame>,
    /// False when neither the unwinder nor the register PC produced a
    /// frame; such a crash carries no fingerprint and must not take part
    /// in uniqueness decisions.
    pub usable_for_uniqueness: bool,
}

/// Run the unwinder over `tid` and symbolize the result.
///
/// When the unwinder comes back empty, the register PC stands in as a
/// synthetic root frame so a weak fingerprint can still be formed.
pub fn collect_stack(
    unwinder: &dyn Unwinder,
    resolver: &dyn SymbolResolver,
    tid: Pid,
    reg_pc: u64,
) -> CollectedStack {
    let mut frames = unwinder.unwind(tid);
    frames.truncate(MAX_FRAMES);

    if frames.is_empty() {
        if reg_pc == 0 {
            log::debug!("no frames and no PC for tid={tid}, uniqueness disabled");
            return CollectedStack {
                frames,
                usable_for_uniqueness: false,
            };
        }
        log::debug!("unwinder returned no frames for tid={tid}, synthesizing from PC");
        frames.push(Frame::from_pc(reg_pc));
    }

    // Android unwinders hand back symbolized frames already; elsewhere the
    // symbolization pass runs separately.
    #[cfg(not(target_os = "android"))]
    resolver.resolve(tid, &mut frames);

    CollectedStack {
        frames,
        usable_for_uniqueness: true,
    }
}
