// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::shared::constants;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime-immutable triage policy, loaded once at startup and shared
/// read-only between workers.
///
/// The symbol lists are small and scanned linearly; the hash blacklist is
/// sorted at construction time and membership-tested with a binary search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageConfig {
    // Workspace directory crash artifacts and reports land in
    work_dir: PathBuf,
    // Extension appended to crash artifact filenames
    file_extension: String,
    num_major_frames: usize,
    save_unique: bool,
    save_maps: bool,
    // When set, PC and fault address are zeroed before filename formatting
    // so ASLR-permuted duplicates collapse onto one artifact
    disable_randomization: bool,
    // Mutation rate of the surrounding fuzzer; 0.0 means a dry run
    flip_rate: f64,
    use_verifier: bool,
    symbols_whitelist: Vec<String>,
    symbols_blacklist: Vec<String>,
    hash_blacklist: Vec<u64>,
    // Fault addresses below this floor on kernel-raised signals are
    // treated as uninteresting early NULL derefs and suppressed
    ignore_addr: u64,
}

impl TriageConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        work_dir: PathBuf,
        file_extension: String,
        num_major_frames: usize,
        save_unique: bool,
        save_maps: bool,
        disable_randomization: bool,
        flip_rate: f64,
        use_verifier: bool,
        symbols_whitelist: Vec<String>,
        symbols_blacklist: Vec<String>,
        mut hash_blacklist: Vec<u64>,
        ignore_addr: u64,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            num_major_frames >= 1,
            "at least one major frame is required to fingerprint a crash"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&flip_rate),
            "flip rate {flip_rate} outside [0.0, 1.0]"
        );
        hash_blacklist.sort_unstable();
        hash_blacklist.dedup();

        Ok(Self {
            work_dir,
            file_extension,
            num_major_frames,
            save_unique,
            save_maps,
            disable_randomization,
            flip_rate,
            use_verifier,
            symbols_whitelist,
            symbols_blacklist,
            hash_blacklist,
            ignore_addr,
        })
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        anyhow::ensure!(config.num_major_frames >= 1, "invalid major frame count");
        anyhow::ensure!(
            config.hash_blacklist.windows(2).all(|w| w[0] < w[1]),
            "hash blacklist must be sorted and free of duplicates"
        );
        Ok(config)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    pub fn num_major_frames(&self) -> usize {
        self.num_major_frames
    }

    pub fn save_unique(&self) -> bool {
        self.save_unique
    }

    pub fn save_maps(&self) -> bool {
        self.save_maps
    }

    pub fn disable_randomization(&self) -> bool {
        self.disable_randomization
    }

    pub fn use_verifier(&self) -> bool {
        self.use_verifier
    }

    /// A flip rate of exactly zero means no mutation happens at all; crashes
    /// are then persisted under the input's original name for replay.
    pub fn is_dry_run(&self) -> bool {
        self.flip_rate == 0.0
    }

    pub fn symbols_whitelist(&self) -> &[String] {
        &self.symbols_whitelist
    }

    pub fn symbols_blacklist(&self) -> &[String] {
        &self.symbols_blacklist
    }

    pub fn is_hash_blacklisted(&self, hash: u64) -> bool {
        self.hash_blacklist.binary_search(&hash).is_ok()
    }

    pub fn ignore_addr(&self) -> u64 {
        self.ignore_addr
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            file_extension: "fuzz".to_string(),
            num_major_frames: constants::DEFAULT_MAJOR_FRAMES,
            save_unique: true,
            save_maps: false,
            disable_randomization: false,
            flip_rate: 0.01,
            use_verifier: false,
            symbols_whitelist: vec![],
            symbols_blacklist: vec![],
            hash_blacklist: vec![],
            ignore_addr: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sorts_hash_blacklist() {
        let config = TriageConfig::new(
            PathBuf::from("/tmp/out"),
            "fuzz".to_string(),
            7,
            true,
            false,
            false,
            0.05,
            false,
            vec![],
            vec![],
            vec![0xdead, 0x1, 0xbeef, 0x1],
            0,
        )
        .unwrap();
        assert!(config.is_hash_blacklisted(0x1));
        assert!(config.is_hash_blacklisted(0xbeef));
        assert!(config.is_hash_blacklisted(0xdead));
        assert!(!config.is_hash_blacklisted(0x2));
    }

    #[test]
    fn test_new_rejects_zero_major_frames() {
        TriageConfig::new(
            PathBuf::from("/tmp/out"),
            "fuzz".to_string(),
            0,
            true,
            false,
            false,
            0.05,
            false,
            vec![],
            vec![],
            vec![],
            0,
        )
        .unwrap_err();
    }

    #[test]
    fn test_dry_run_is_zero_flip_rate() {
        let mut config = TriageConfig::default();
        assert!(!config.is_dry_run());
        config.flip_rate = 0.0;
        assert!(config.is_dry_run());
    }

    #[test]
    fn test_json_round_trip() {
        let config = TriageConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = TriageConfig::from_json(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_from_json_rejects_unsorted_blacklist() {
        let mut config = TriageConfig::default();
        config.hash_blacklist = vec![3, 1, 2];
        let json = serde_json::to_string(&config).unwrap();
        TriageConfig::from_json(&json).unwrap_err();
    }
}
