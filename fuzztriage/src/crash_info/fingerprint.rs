// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Callstack fingerprinting.
//!
//! A crash is identified by a 64-bit digest over the innermost
//! "major" frames. Only the final three hex characters of each frame's
//! rendered PC participate, which makes the digest robust against module
//! reloads at different base addresses while keeping enough discrimination
//! within a page-aligned mapping. The digest must be identical across runs
//! and workers, so the mixer is a fixed table-free function and the frame
//! order is significant.

use crate::crash_info::Frame;
use crate::shared::constants::SINGLE_FRAME_MASK;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash of the final three characters of `value` rendered as a
/// width-padded lowercase hex literal. Padding never reaches into the
/// final three characters, so the result is the same for 32- and 64-bit
/// renderings.
pub fn hex_tail_hash(value: u64) -> u64 {
    let rendered = format!("{value:#018x}");
    let tail = &rendered.as_bytes()[rendered.len() - 3..];
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in tail {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    // The top bit is reserved for the single-frame mark and must never be
    // produced by mixing.
    hash & !SINGLE_FRAME_MASK
}

/// XOR-reduce the first `num_major` frames into the callstack hash.
pub fn callstack_hash(frames: &[Frame], num_major: usize) -> u64 {
    let mut hash = 0u64;
    for frame in frames.iter().take(num_major) {
        hash ^= hex_tail_hash(frame.pc);
    }
    hash
}

/// Mark a hash as coming from a single-frame backtrace. Single-frame
/// callstacks are weak signals; the reserved bit lets downstream tooling
/// re-group them without conflating them with fully unwound hashes.
pub fn mark_single_frame(hash: u64) -> u64 {
    hash | SINGLE_FRAME_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_of(pcs: &[u64]) -> Vec<Frame> {
        pcs.iter().map(|&pc| Frame::from_pc(pc)).collect()
    }

    #[test]
    fn test_hash_depends_only_on_hex_tail() {
        // 0x4011a0 and 0x7f59c83001a0 share the tail "1a0".
        assert_eq!(hex_tail_hash(0x4011a0), hex_tail_hash(0x7f59_c830_01a0));
        assert_ne!(hex_tail_hash(0x4011a0), hex_tail_hash(0x4011a1));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let frames = frames_of(&[0x4011a0, 0x4007f0, 0x400620]);
        let first = callstack_hash(&frames, 7);
        for _ in 0..100 {
            assert_eq!(callstack_hash(&frames, 7), first);
        }
    }

    #[test]
    fn test_hash_is_xor_of_frame_tails() {
        let frames = frames_of(&[0x4011a0, 0x4007f0, 0x400620]);
        let expected =
            hex_tail_hash(0x4011a0) ^ hex_tail_hash(0x4007f0) ^ hex_tail_hash(0x400620);
        assert_eq!(callstack_hash(&frames, 7), expected);
    }

    #[test]
    fn test_major_frame_bound() {
        let frames = frames_of(&[0x100, 0x200, 0x300, 0x400]);
        assert_eq!(
            callstack_hash(&frames, 2),
            hex_tail_hash(0x100) ^ hex_tail_hash(0x200)
        );
        // Frames past the bound never influence the digest.
        let longer = frames_of(&[0x100, 0x200, 0x999, 0x888]);
        assert_eq!(callstack_hash(&frames, 2), callstack_hash(&longer, 2));
    }

    #[test]
    fn test_empty_backtrace_hashes_to_zero() {
        assert_eq!(callstack_hash(&[], 7), 0);
    }

    #[test]
    fn test_mixer_never_sets_mask_bit() {
        for value in 0..4096u64 {
            assert_eq!(hex_tail_hash(value) & SINGLE_FRAME_MASK, 0);
        }
    }

    #[test]
    fn test_single_frame_mark() {
        let hash = callstack_hash(&frames_of(&[0x4011a0]), 7);
        let marked = mark_single_frame(hash);
        assert_ne!(hash, marked);
        assert_eq!(marked & !SINGLE_FRAME_MASK, hash);
    }
}
