// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod environment;
pub mod error;
pub mod kubernetes;
pub mod manifests;
pub mod provision;
pub mod script;
pub mod types;
pub mod wait;

#[cfg(test)]
pub mod test_utils;

pub use environment::{Environment, LifecycleState};
pub use error::{EnvironmentError, Result};
