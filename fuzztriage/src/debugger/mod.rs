// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Kernel-debug plumbing: seizing targets, steering their tasks and
//! pulling crash context (registers, memory, instruction text) out of
//! stopped tasks.

mod attach;
mod instruction;
mod memory;
mod registers;
mod threads;

pub use attach::*;
pub use instruction::*;
pub use memory::*;
pub use registers::*;
pub use threads::*;

use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DebuggerError {
    #[error("failed to list tasks of process {pid}: {source}")]
    TaskList { pid: Pid, source: std::io::Error },
    #[error("failed to seize task {tid}: {source}")]
    Seize { tid: Pid, source: Errno },
    #[error("failed to read registers of task {tid}: {source}")]
    RegistersUnavailable { tid: Pid, source: Errno },
}
