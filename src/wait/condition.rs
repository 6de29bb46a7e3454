// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Declarative completion criteria

use crate::constants::wait::{DEFAULT_INTERVAL, DEFAULT_TIMEOUT};
use crate::error::{EnvironmentError, Result};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// What kind of cluster state a condition waits for. Derived from the
/// [`State`] inputs, never chosen directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum StateType {
    #[default]
    Invalid,
    /// An event with a given reason was recorded for the resource
    Event,
    /// An entry of `status.conditions` has a given status
    StatusCondition,
    /// An arbitrary `status.<key>` field has a given value
    StatusCustom,
}

/// The object a condition watches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resource {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl Resource {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.kind.is_empty() && !self.name.is_empty() && !self.namespace.is_empty()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Inputs of the state classification plus the derived [`StateType`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    state_type: StateType,
    pub reason: String,
    pub condition_type: String,
    pub status: String,
    pub status_key: String,
    pub status_value: String,
}

impl State {
    pub fn event(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            ..Default::default()
        }
        .derived()
    }

    pub fn status_condition(condition_type: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            condition_type: condition_type.into(),
            status: status.into(),
            ..Default::default()
        }
        .derived()
    }

    pub fn status_custom(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            status_key: key.into(),
            status_value: value.into(),
            ..Default::default()
        }
        .derived()
    }

    pub fn state_type(&self) -> StateType {
        self.state_type
    }

    /// Classify the inputs. A reason means Event; otherwise a condition type
    /// with a status means StatusCondition; otherwise a status key with a
    /// value means StatusCustom. Inputs of lower branches are ignored.
    pub fn derive_type(&mut self) {
        self.state_type = if !self.reason.is_empty() {
            StateType::Event
        } else if !self.condition_type.is_empty() && !self.status.is_empty() {
            StateType::StatusCondition
        } else if !self.status_key.is_empty() && !self.status_value.is_empty() {
            StateType::StatusCustom
        } else {
            StateType::Invalid
        };
    }

    fn derived(mut self) -> Self {
        self.derive_type();
        self
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state_type {
            StateType::Event => write!(f, "event with reason {}", self.reason),
            StateType::StatusCondition => {
                write!(f, "condition {}={}", self.condition_type, self.status)
            }
            StateType::StatusCustom => write!(f, "status.{}={}", self.status_key, self.status_value),
            StateType::Invalid => write!(f, "invalid state"),
        }
    }
}

/// A resource, the state it should reach, and how long to poll for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitCondition {
    pub resource: Resource,
    pub state: State,
    interval: Duration,
    timeout: Duration,
}

impl WaitCondition {
    pub fn new(resource: Resource, mut state: State) -> Self {
        state.derive_type();
        Self {
            resource,
            state,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Parse a loosely-typed condition object of one of the shapes
    /// `{kind, name, namespace, reason}`,
    /// `{kind, name, namespace, condition_type, value}` or
    /// `{kind, name, namespace, status_key, status_value}`.
    ///
    /// Fields that are missing or not strings count as empty.
    pub fn parse(config: &Value) -> Result<Self> {
        let Some(fields) = config.as_object() else {
            return Err(EnvironmentError::ConfigurationError(format!(
                "wait condition must be an object, got: {}",
                config
            )));
        };
        let get = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let status = match get("value") {
            v if v.is_empty() => get("status"),
            v => v,
        };
        let resource = Resource::new(get("kind"), get("name"), get("namespace"));
        let state = State {
            reason: get("reason"),
            condition_type: get("condition_type"),
            status,
            status_key: get("status_key"),
            status_value: get("status_value"),
            ..Default::default()
        };

        let condition = Self::new(resource, state);
        if condition.state_type() == StateType::Invalid {
            return Err(EnvironmentError::ValidationError(
                "condition needs a reason, a condition_type with a value, or a status_key with a status_value"
                    .to_string(),
            ));
        }
        if !condition.validate() {
            return Err(EnvironmentError::ValidationError(format!(
                "condition needs kind, name and namespace, got {}",
                condition.resource
            )));
        }
        Ok(condition)
    }

    pub fn state_type(&self) -> StateType {
        self.state.state_type()
    }

    /// A condition is usable when it names a complete resource and a state.
    pub fn validate(&self) -> bool {
        self.state_type() > StateType::Invalid && self.resource.is_complete()
    }

    /// Override the polling interval and timeout; `None` or zero keeps the
    /// current value.
    pub fn with_time_params(mut self, interval: Option<Duration>, timeout: Option<Duration>) -> Self {
        if let Some(interval) = interval.filter(|d| !d.is_zero()) {
            self.interval = interval;
        }
        if let Some(timeout) = timeout.filter(|d| !d.is_zero()) {
            self.timeout = timeout;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to reach {}", self.resource, self.state)
    }
}
