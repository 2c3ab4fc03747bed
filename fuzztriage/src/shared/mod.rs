// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Constants, configuration and process-wide state shared by every worker.

pub mod configuration;
pub mod constants;
pub mod counters;
pub mod fs;
