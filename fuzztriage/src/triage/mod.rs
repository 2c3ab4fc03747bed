// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod artifact;
mod dispatcher;
mod policy;
mod worker;

pub use artifact::*;
pub use dispatcher::*;
pub use policy::*;
pub use worker::*;
