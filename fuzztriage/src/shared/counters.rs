// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering::SeqCst};

/// Process-wide triage bookkeeping shared by every worker thread.
///
/// Workers share nothing else; all mutation goes through atomic
/// read-modify-write operations and no lock ever guards these fields.
///
/// ATOMICITY:
///     Each individual counter update is atomic. A snapshot taken while
///     workers are running may mix values from different instants, which is
///     fine for status display.
#[derive(Debug, Default)]
pub struct GlobalCounters {
    /// Every triaged crash event, duplicates included.
    crashes: AtomicU64,
    /// Crashes persisted under a new fingerprint-encoding filename.
    unique_crashes: AtomicU64,
    /// Crashes dropped by the hash or symbol blacklist.
    blacklisted_crashes: AtomicU64,
    /// Countdown until the dynamic input corpus is rescanned; a fresh
    /// unique crash resets it so interesting inputs are revisited soon.
    dynfile_iter_countdown: AtomicU64,
}

/// Point-in-time copy of the counters, for the surrounding fuzzer's
/// status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub crashes: u64,
    pub unique_crashes: u64,
    pub blacklisted_crashes: u64,
}

impl GlobalCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_crash(&self) -> u64 {
        self.crashes.fetch_add(1, SeqCst) + 1
    }

    pub fn count_unique_crash(&self) -> u64 {
        self.unique_crashes.fetch_add(1, SeqCst) + 1
    }

    pub fn count_blacklisted_crash(&self) -> u64 {
        self.blacklisted_crashes.fetch_add(1, SeqCst) + 1
    }

    /// Consume one tick of the dynamic-file countdown, saturating at zero.
    pub fn tick_dynfile_countdown(&self) -> u64 {
        self.dynfile_iter_countdown
            .fetch_update(SeqCst, SeqCst, |v| v.checked_sub(1))
            .unwrap_or(0)
    }

    pub fn reset_dynfile_countdown(&self, ticks: u64) {
        self.dynfile_iter_countdown.store(ticks, SeqCst);
    }

    pub fn dynfile_countdown(&self) -> u64 {
        self.dynfile_iter_countdown.load(SeqCst)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            crashes: self.crashes.load(SeqCst),
            unique_crashes: self.unique_crashes.load(SeqCst),
            blacklisted_crashes: self.blacklisted_crashes.load(SeqCst),
        }
    }
}
