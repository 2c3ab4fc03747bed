// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::crash_info::CrashContext;
use crate::shared::configuration::TriageConfig;

/// Outcome of running a crash through the admission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Uninteresting early NULL deref below the configured floor; dropped
    /// before any counter moves.
    Suppressed,
    /// Keep the crash. `force_timestamp` is set for whitelisted crashes,
    /// which are always persisted under a fresh timestamped name.
    Admit { force_timestamp: bool },
    /// Fingerprint found in the hash blacklist.
    DropHashBlacklisted,
    /// A blacklisted symbol appeared in the backtrace.
    DropSymbolBlacklisted,
}

/// Decide whether a triaged crash is persisted, dropped or suppressed.
///
/// The whitelist wins over both blacklists: a crash in code the user
/// explicitly cares about is always kept, and kept unconditionally
/// (timestamped filename) so repeated hits don't collapse onto one file.
pub fn evaluate(config: &TriageConfig, ctx: &CrashContext) -> Verdict {
    if ctx.signum != 0 && !ctx.from_user && ctx.pc != 0 && ctx.fault_addr < config.ignore_addr() {
        log::debug!(
            "suppressing crash at pc {:#x}: fault address {:#x} below floor {:#x}",
            ctx.pc,
            ctx.fault_addr,
            config.ignore_addr()
        );
        return Verdict::Suppressed;
    }

    if ctx.any_symbol_matches(config.symbols_whitelist()) {
        log::debug!("whitelisted symbol in backtrace, admitting unconditionally");
        return Verdict::Admit {
            force_timestamp: true,
        };
    }

    if config.is_hash_blacklisted(ctx.hash) {
        log::debug!("stack hash {:#x} is blacklisted", ctx.hash);
        return Verdict::DropHashBlacklisted;
    }

    if ctx.any_symbol_matches(config.symbols_blacklist()) {
        log::debug!("blacklisted symbol in backtrace");
        return Verdict::DropSymbolBlacklisted;
    }

    Verdict::Admit {
        force_timestamp: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash_info::Frame;
    use std::path::PathBuf;

    fn config_with(
        whitelist: Vec<String>,
        blacklist: Vec<String>,
        hashes: Vec<u64>,
        ignore_addr: u64,
    ) -> TriageConfig {
        TriageConfig::new(
            PathBuf::from("/tmp/out"),
            "fuzz".to_string(),
            7,
            true,
            false,
            false,
            0.05,
            false,
            whitelist,
            blacklist,
            hashes,
            ignore_addr,
        )
        .unwrap()
    }

    fn crash_with_symbols(symbols: &[&str]) -> CrashContext {
        let mut ctx = CrashContext::new(1000);
        ctx.signum = libc::SIGSEGV;
        ctx.si_code = 1; // SEGV_MAPERR; not exposed by libc on this target
        ctx.pc = 0x4011a0;
        ctx.hash = 0xabcd;
        for (i, s) in symbols.iter().enumerate() {
            let mut frame = Frame::from_pc(0x1000 + i as u64);
            frame.set_symbol(s);
            ctx.push_frame(frame);
        }
        ctx
    }

    #[test]
    fn test_plain_crash_is_admitted() {
        let config = config_with(vec![], vec![], vec![], 0);
        let ctx = crash_with_symbols(&["main"]);
        assert_eq!(
            evaluate(&config, &ctx),
            Verdict::Admit {
                force_timestamp: false
            }
        );
    }

    #[test]
    fn test_low_fault_addr_is_suppressed() {
        let config = config_with(vec![], vec![], vec![], 0x1000);
        let mut ctx = crash_with_symbols(&["main"]);
        ctx.fault_addr = 0x10;
        assert_eq!(evaluate(&config, &ctx), Verdict::Suppressed);
    }

    #[test]
    fn test_user_signal_is_never_suppressed() {
        let config = config_with(vec![], vec![], vec![], 0x1000);
        let mut ctx = crash_with_symbols(&["main"]);
        ctx.fault_addr = 0x10;
        ctx.from_user = true;
        assert!(matches!(evaluate(&config, &ctx), Verdict::Admit { .. }));
    }

    #[test]
    fn test_sanitizer_crash_skips_fault_addr_floor() {
        let config = config_with(vec![], vec![], vec![], 0x1000);
        let mut ctx = crash_with_symbols(&["main"]);
        ctx.signum = 0; // sanitizer-exit path
        ctx.fault_addr = 0x10;
        assert!(matches!(evaluate(&config, &ctx), Verdict::Admit { .. }));
    }

    #[test]
    fn test_whitelist_beats_blacklists() {
        let config = config_with(
            vec!["interesting_func".to_string()],
            vec!["interesting_func".to_string()],
            vec![0xabcd],
            0,
        );
        let ctx = crash_with_symbols(&["boring", "interesting_func"]);
        assert_eq!(
            evaluate(&config, &ctx),
            Verdict::Admit {
                force_timestamp: true
            }
        );
    }

    #[test]
    fn test_hash_blacklist_drops() {
        let config = config_with(vec![], vec![], vec![0xabcd], 0);
        let ctx = crash_with_symbols(&["main"]);
        assert_eq!(evaluate(&config, &ctx), Verdict::DropHashBlacklisted);
    }

    #[test]
    fn test_symbol_blacklist_drops() {
        let config = config_with(vec![], vec!["known_bad".to_string()], vec![], 0);
        let ctx = crash_with_symbols(&["main", "known_bad_handler"]);
        assert_eq!(evaluate(&config, &ctx), Verdict::DropSymbolBlacklisted);
    }
}
