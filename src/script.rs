// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Adapter for scripting hosts.
//!
//! Script calls pass loosely-typed objects and expect an error message
//! back instead of a typed error: every method returns `None` on success.

use crate::config::Config;
use crate::environment::Environment;
use crate::error::{EnvironmentError, Result};
use crate::kubernetes::workload::TestOutcome;
use crate::kubernetes::{ContextStore, KubeconfigFile};
use crate::provision::{Provisioner, VclusterCli};
use crate::wait::{WaitCondition, WaitOptions};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Completion criteria as written in a script
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CriteriaParams {
    pub test: String,
}

/// Constructor parameters `{name, initFolder, criteria?}`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentParams {
    pub name: String,
    pub init_folder: PathBuf,
    #[serde(default)]
    pub criteria: CriteriaParams,
}

impl EnvironmentParams {
    pub fn parse(params: &Value) -> Result<Self> {
        let parsed: Self = serde_json::from_value(params.clone()).map_err(|e| {
            EnvironmentError::ConfigurationError(format!(
                "environment parameters must look like {{name, initFolder}}: {}",
                e
            ))
        })?;
        if parsed.name.is_empty() {
            return Err(EnvironmentError::ConfigurationError(
                "environment name must not be empty".to_string(),
            ));
        }
        Ok(parsed)
    }
}

fn degrade(operation: &str, result: Result<()>) -> Option<String> {
    result.err().map(|e| {
        error!("{} failed: {}", operation, e);
        e.to_string()
    })
}

pub struct ScriptEnvironment<S: ContextStore = KubeconfigFile, P: Provisioner = VclusterCli> {
    inner: Environment<S, P>,
    cancel: CancellationToken,
}

impl ScriptEnvironment {
    /// Build the environment described by `params`. Unlike the methods this
    /// fails with a typed error, as a constructor cannot return a message.
    pub fn new(params: &Value, config: &Config) -> Result<Self> {
        let params = EnvironmentParams::parse(params)?;
        let criteria: TestOutcome = params.criteria.test.parse()?;
        let env = Environment::from_folder(&params.name, &params.init_folder, config)?
            .with_criteria(criteria);
        Ok(Self::from_environment(env))
    }
}

impl<S: ContextStore, P: Provisioner> ScriptEnvironment<S, P> {
    pub fn from_environment(inner: Environment<S, P>) -> Self {
        Self {
            inner,
            cancel: CancellationToken::new(),
        }
    }

    pub fn environment(&self) -> &Environment<S, P> {
        &self.inner
    }

    /// Token that aborts a running `wait` or `run_test` when cancelled
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn create(&mut self) -> Option<String> {
        degrade("create", self.inner.create().await)
    }

    pub async fn delete(&mut self) -> Option<String> {
        degrade("delete", self.inner.delete().await)
    }

    pub async fn apply(&mut self, file: &str) -> Option<String> {
        degrade("apply", self.inner.apply(Path::new(file)).await.map(|_| ()))
    }

    pub async fn apply_spec(&mut self, spec: &str) -> Option<String> {
        degrade("applySpec", self.inner.apply_spec(spec).await.map(|_| ()))
    }

    pub async fn run_test(&mut self) -> Option<String> {
        degrade("runTest", self.inner.run_test(&self.cancel).await)
    }

    /// Wait for `condition`, with optional `{interval, timeout}` overrides.
    pub async fn wait(&mut self, condition: &Value, options: Option<&Value>) -> Option<String> {
        let condition = match parse_wait(condition, options) {
            Ok(condition) => condition,
            Err(e) => return degrade("wait", Err(e)),
        };
        degrade("wait", self.inner.wait(&condition, &self.cancel).await)
    }

    /// Pod count in `namespace`, or the error message.
    pub async fn get_n(&mut self, namespace: &str, selector: Option<&str>) -> std::result::Result<usize, String> {
        self.inner.get_n(namespace, selector).await.map_err(|e| {
            error!("getN failed: {}", e);
            e.to_string()
        })
    }

    pub fn describe(&self) -> String {
        self.inner.describe()
    }
}

fn parse_wait(condition: &Value, options: Option<&Value>) -> Result<WaitCondition> {
    let condition = WaitCondition::parse(condition)?;
    match options {
        Some(options) if !options.is_null() => {
            let options = WaitOptions::parse(options)?;
            Ok(condition.with_time_params(options.interval, options.timeout))
        }
        _ => Ok(condition),
    }
}
