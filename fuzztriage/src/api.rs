// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::debugger;
use crate::engine::{
    Disassembler, NullResolver, NullUnwinder, RawBytesDisassembler, SymbolResolver, Unwinder,
};
use crate::shared::configuration::TriageConfig;
use crate::shared::counters::{CounterSnapshot, GlobalCounters};
use nix::unistd::Pid;

/// The triage core: immutable policy, shared counters, and the external
/// engines it drives. One instance is shared read-only by all workers;
/// per-worker scratch lives in [`WorkerState`](crate::triage::WorkerState).
pub struct Triage {
    config: TriageConfig,
    counters: GlobalCounters,
    unwinder: Box<dyn Unwinder>,
    resolver: Box<dyn SymbolResolver>,
    disassembler: Box<dyn Disassembler>,
}

impl Triage {
    pub fn new(
        config: TriageConfig,
        unwinder: Box<dyn Unwinder>,
        resolver: Box<dyn SymbolResolver>,
        disassembler: Box<dyn Disassembler>,
    ) -> Self {
        Self {
            config,
            counters: GlobalCounters::new(),
            unwinder,
            resolver,
            disassembler,
        }
    }

    /// Construct with the built-in engines: no unwinding beyond the
    /// register PC, no symbols, raw-byte instruction text. Enough for
    /// dedup by PC and for tests.
    pub fn with_default_engines(config: TriageConfig) -> Self {
        Self::new(
            config,
            Box::new(NullUnwinder),
            Box::new(NullResolver),
            Box::new(RawBytesDisassembler),
        )
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn counters(&self) -> &GlobalCounters {
        &self.counters
    }

    pub fn counter_snapshot(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub(crate) fn unwinder(&self) -> &dyn Unwinder {
        self.unwinder.as_ref()
    }

    pub(crate) fn resolver(&self) -> &dyn SymbolResolver {
        self.resolver.as_ref()
    }

    pub(crate) fn disassembler(&self) -> &dyn Disassembler {
        self.disassembler.as_ref()
    }

    /// Seize `pid` and all of its tasks. Returns false when the root task
    /// could not be seized; a partial attach over the remaining tasks
    /// still counts as success.
    pub fn attach(&self, pid: Pid) -> bool {
        match debugger::attach(pid) {
            Ok(target) => {
                log::debug!(
                    "process {pid} attached with {} task(s)",
                    target.tasks.len()
                );
                true
            }
            Err(e) => {
                log::error!("couldn't attach to process {pid}: {e}");
                false
            }
        }
    }

    /// Interrupt, await and release every task of `pid`. A process that
    /// already died makes this a no-op.
    pub fn detach(&self, pid: Pid) {
        debugger::detach(pid);
    }

    /// Block until `pid` reports a stop; false on any terminal status.
    pub fn wait_for_stop(&self, pid: Pid) -> bool {
        debugger::wait_for_stop(pid)
    }
}
