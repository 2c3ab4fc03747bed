// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod context;
mod fingerprint;
mod frame;
mod signals;
mod stack;

pub use context::*;
pub use fingerprint::*;
pub use frame::*;
pub use signals::*;
pub use stack::*;
