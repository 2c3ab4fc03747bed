// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Status-word dispatch: every wait status a worker observes on its
//! target funnels through [`Triage::analyze`], which routes crashes into
//! deep analysis and persistence and resumes the task.

use crate::api::Triage;
use crate::crash_info::{
    callstack_hash, collect_stack, is_important_signal, mark_single_frame, si_from_user,
    siginfo_fault_addr, CrashContext,
};
use crate::debugger::{read_instruction_text, read_pc_status, RegsWidth};
use crate::sanitizer::{parse_report, SanitizerKind};
use crate::triage::{evaluate, persist_crash, CrashKind, Verdict, WorkerState};
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
use crate::crash_info::hex_tail_hash;
#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
use crate::debugger::read_link_register;

impl Triage {
    /// Interpret one `(status, pid)` pair as delivered by the worker's
    /// wait loop, run the matching triage path, and resume the task.
    ///
    /// Transient failures never propagate out of here; an unclassifiable
    /// status word is a programming error and aborts the worker.
    pub fn analyze(&self, status: i32, pid: Pid, worker: &mut WorkerState) {
        match WaitStatus::from_raw(pid, status) {
            Ok(WaitStatus::PtraceEvent(tid, _, event)) => {
                self.handle_ptrace_event(tid, event, worker);
                resume(tid, None);
            }
            Ok(WaitStatus::Stopped(tid, sig)) => {
                if is_important_signal(sig as i32) {
                    if worker.is_main {
                        self.save_crash(tid, sig as i32, worker);
                    } else {
                        self.analyze_crash_only(tid, sig as i32, worker);
                    }
                }
                // Forward the signal so the target dies (or handles it)
                // exactly as it would untraced.
                resume(tid, Some(sig));
            }
            Ok(WaitStatus::Exited(tid, code)) => {
                if let Some(kind) = SanitizerKind::from_exit_code(code) {
                    self.save_sanitizer_crash(tid, kind, worker);
                }
            }
            Ok(WaitStatus::Signaled(..))
            | Ok(WaitStatus::Continued(..))
            | Ok(WaitStatus::StillAlive) => {}
            Ok(other) => {
                panic!("unclassifiable wait status {other:?} for pid {pid} (raw {status:#x})")
            }
            Err(e) => panic!("undecodable status word {status:#x} for pid {pid}: {e}"),
        }
    }

    /// Ptrace stop with an event in the upper status bits. Child-creation
    /// events just mean a new task was auto-attached; only EXIT carries
    /// triage-relevant payload (the pending exit status).
    fn handle_ptrace_event(&self, tid: Pid, event: i32, worker: &mut WorkerState) {
        if event != libc::PTRACE_EVENT_EXIT {
            return;
        }
        let msg = match ptrace::getevent(tid) {
            Ok(msg) => msg,
            Err(e) => {
                log::debug!("couldn't fetch exit-event message of task {tid}: {e}");
                return;
            }
        };
        let exit_status = msg as i32;
        if libc::WIFEXITED(exit_status) {
            let code = libc::WEXITSTATUS(exit_status);
            if let Some(kind) = SanitizerKind::from_exit_code(code) {
                self.save_sanitizer_crash(tid, kind, worker);
            }
        } else if !libc::WIFSIGNALED(exit_status) {
            // Some ABIs truncate the event payload to something that isn't
            // a status word at all; the real exit code is still observable
            // once the task is reaped, so just note it and move on.
            log::debug!("exit-event message {msg:#x} of task {tid} is not a status word");
        }
    }

    /// Full save path for an important stop signal on the main worker.
    fn save_crash(&self, tid: Pid, signum: i32, worker: &mut WorkerState) {
        let Some((ctx, unique_ok)) = self.collect_signal_context(tid, signum, worker.is_main)
        else {
            return;
        };

        // A sibling task of the same process typically reports the same
        // bug a moment later; drop it silently.
        if worker.has_persisted_crash() && worker.backtrace == ctx.hash {
            log::debug!("task {tid} repeated hash {:#x}, ignoring", ctx.hash);
            return;
        }
        worker.backtrace = ctx.hash;

        let verdict = evaluate(self.config(), &ctx);
        if verdict == Verdict::Suppressed {
            return;
        }
        self.counters().count_crash();

        match verdict {
            Verdict::Admit { force_timestamp } => {
                let unique = self.config().save_unique()
                    && unique_ok
                    && ctx.hash != 0
                    && !force_timestamp;
                let kind = CrashKind::Signal {
                    signum,
                    si_code: ctx.si_code,
                };
                persist_crash(self.config(), self.counters(), worker, &ctx, &kind, unique);
            }
            Verdict::DropHashBlacklisted | Verdict::DropSymbolBlacklisted => {
                self.counters().count_blacklisted_crash();
            }
            Verdict::Suppressed => unreachable!(),
        }
    }

    /// Verifier path: reconstruct the context and record the hash, but
    /// never touch persistence state or counters.
    fn analyze_crash_only(&self, tid: Pid, signum: i32, worker: &mut WorkerState) {
        if let Some((ctx, _)) = self.collect_signal_context(tid, signum, worker.is_main) {
            worker.backtrace = ctx.hash;
        }
    }

    /// Reconstruct the crash context of a signal-stopped task. `None`
    /// means the task died mid-analysis or its register layout is
    /// unsupported; either way deep analysis is abandoned for this event.
    fn collect_signal_context(
        &self,
        tid: Pid,
        signum: i32,
        enable_masking: bool,
    ) -> Option<(CrashContext, bool)> {
        let cpu = match read_pc_status(tid) {
            Ok(cpu) => cpu,
            Err(e) => {
                log::debug!("abandoning analysis of task {tid}: {e}");
                return None;
            }
        };
        if cpu.width == RegsWidth::Unknown {
            log::warn!("task {tid} has an unsupported register layout, skipping deep analysis");
            return None;
        }
        let siginfo = match ptrace::getsiginfo(tid) {
            Ok(info) => info,
            Err(e) => {
                log::debug!("couldn't read siginfo of task {tid}: {e}");
                return None;
            }
        };

        let mut ctx = CrashContext::new(tid.as_raw());
        ctx.signum = signum;
        ctx.si_code = siginfo.si_code;
        ctx.from_user = si_from_user(siginfo.si_code);
        ctx.fault_addr = siginfo_fault_addr(signum, &siginfo);
        ctx.status_reg = cpu.status_reg;
        ctx.width = cpu.width;

        let mut pc = cpu.pc;
        ctx.instr = read_instruction_text(self.disassembler(), tid, &mut pc, &cpu);
        ctx.pc = pc;

        let stack = collect_stack(self.unwinder(), self.resolver(), tid, pc);
        #[allow(unused_mut)]
        let mut unique_ok = stack.usable_for_uniqueness;
        ctx.frames = stack.frames;

        let mut hash = callstack_hash(&ctx.frames, self.config().num_major_frames());
        #[allow(unused_mut)]
        let mut enable_masking = enable_masking;
        if ctx.frames.len() == 1 {
            // Single-frame traces are weak; ARM link registers win back a
            // few bits of discrimination.
            #[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
            match read_link_register(tid) {
                Ok(lr) => hash ^= hex_tail_hash(lr),
                Err(e) => {
                    log::debug!("couldn't read LR of task {tid}: {e}");
                    enable_masking = false;
                    unique_ok = false;
                }
            }
            if enable_masking {
                hash = mark_single_frame(hash);
            }
        }
        ctx.hash = hash;
        Some((ctx, unique_ok))
    }

    /// Sanitizer-exit path: the crash context comes from the report file
    /// the sanitizer runtime wrote, not from the (already dead) task.
    fn save_sanitizer_crash(&self, pid: Pid, san: SanitizerKind, worker: &mut WorkerState) {
        let report = match parse_report(self.config().work_dir(), pid) {
            Ok(Some(report)) => report,
            // Not written yet: a sibling task exits a moment later and
            // finds it. Leaving `crash_file` untouched keeps the retry
            // window open.
            Ok(None) => return,
            Err(e) => {
                log::warn!("couldn't parse sanitizer report of pid {pid}: {e}");
                return;
            }
        };

        let mut ctx = CrashContext::new(pid.as_raw());
        ctx.pc = report.pc();
        ctx.fault_addr = report.fault_addr;
        ctx.width = RegsWidth::native();
        ctx.frames = report.frames;

        let mut hash = callstack_hash(&ctx.frames, self.config().num_major_frames());
        if ctx.frames.len() == 1 && worker.is_main {
            hash = mark_single_frame(hash);
        }
        ctx.hash = hash;

        if worker.has_persisted_crash() && worker.backtrace == hash {
            log::debug!("pid {pid} repeated sanitizer hash {hash:#x}, ignoring");
            return;
        }
        worker.backtrace = hash;

        let verdict = evaluate(self.config(), &ctx);
        if verdict == Verdict::Suppressed {
            return;
        }
        self.counters().count_crash();

        match verdict {
            Verdict::Admit { force_timestamp } => {
                let unique = self.config().save_unique()
                    && !ctx.frames.is_empty()
                    && ctx.hash != 0
                    && !force_timestamp;
                let kind = CrashKind::Sanitizer {
                    kind: san,
                    operation: report.operation,
                };
                persist_crash(self.config(), self.counters(), worker, &ctx, &kind, unique);
            }
            Verdict::DropHashBlacklisted | Verdict::DropSymbolBlacklisted => {
                self.counters().count_blacklisted_crash();
            }
            Verdict::Suppressed => unreachable!(),
        }
    }
}

fn resume(tid: Pid, sig: Option<Signal>) {
    if let Err(e) = ptrace::cont(tid, sig) {
        log::debug!("couldn't resume task {tid}: {e}");
    }
}
