// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Wait conditions: classification, predicates and the poll loop.

pub mod condition;
pub mod options;
pub mod poll;
pub mod predicate;

pub use condition::{Resource, State, StateType, WaitCondition};
pub use options::{parse_duration, WaitOptions};
pub use poll::poll_until;
pub use predicate::Predicate;
