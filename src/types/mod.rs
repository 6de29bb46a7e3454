// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod test_definition;

pub use test_definition::{ExecutionMode, K6Options, TestDefinition};
