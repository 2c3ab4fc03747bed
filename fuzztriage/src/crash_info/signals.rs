// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use nix::sys::signal::Signal;

/// Signals whose delivery to a fuzzed child marks a crash worth triaging.
///
/// SIGABRT is excluded on Android, where sanitizer runtimes raise it for
/// conditions that are already reported through the sanitizer exit path.
pub fn is_important_signal(signum: i32) -> bool {
    match signum {
        libc::SIGILL | libc::SIGFPE | libc::SIGSEGV | libc::SIGBUS => true,
        #[cfg(not(target_os = "android"))]
        libc::SIGABRT => true,
        _ => false,
    }
}

/// Human-readable signal name, e.g. `SIGSEGV`. Unknown numbers render as
/// `UNKNOWN` so a filename can always be formed.
pub fn signal_name(signum: i32) -> &'static str {
    match Signal::try_from(signum) {
        Ok(sig) => sig.as_str(),
        Err(_) => "UNKNOWN",
    }
}

/// True when the signal was raised by a user-space sender (kill, tkill,
/// sigqueue, ...) rather than by a fault. The kernel encodes this as a
/// non-positive `si_code`.
pub fn si_from_user(si_code: i32) -> bool {
    si_code <= 0
}

/// Fault address carried by the siginfo, for signals that populate it.
/// Other signals leave the field as garbage, so they report zero.
pub fn siginfo_fault_addr(signum: i32, info: &libc::siginfo_t) -> u64 {
    match signum {
        libc::SIGILL | libc::SIGFPE | libc::SIGSEGV | libc::SIGBUS | libc::SIGTRAP => {
            // SAFETY: si_addr is valid for the fault signals matched above.
            unsafe { info.si_addr() as u64 }
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_important_signals() {
        assert!(is_important_signal(libc::SIGSEGV));
        assert!(is_important_signal(libc::SIGILL));
        assert!(is_important_signal(libc::SIGFPE));
        assert!(is_important_signal(libc::SIGBUS));
        assert!(!is_important_signal(libc::SIGTERM));
        assert!(!is_important_signal(libc::SIGCHLD));
    }

    #[cfg(not(target_os = "android"))]
    #[test]
    fn test_sigabrt_is_important_off_android() {
        assert!(is_important_signal(libc::SIGABRT));
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(signal_name(libc::SIGSEGV), "SIGSEGV");
        assert_eq!(signal_name(libc::SIGABRT), "SIGABRT");
        assert_eq!(signal_name(4242), "UNKNOWN");
    }

    #[test]
    fn test_si_from_user() {
        assert!(si_from_user(0)); // SI_USER
        assert!(si_from_user(-6)); // SI_TKILL
        assert!(!si_from_user(1)); // SEGV_MAPERR; not exposed by libc on this target
    }
}
