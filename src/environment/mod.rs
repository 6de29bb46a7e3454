// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Environment lifecycle: create, apply, run, wait and delete.
//!
//! Every operation that talks to the environment's cluster runs inside a
//! [`ContextGuard`], so the kubeconfig's current-context the caller had is
//! the one it finds afterwards, whatever the operation or the provisioning
//! tool did in between.

use crate::config::Config;
use crate::error::{EnvironmentError, Result};
use crate::kubernetes::apply::apply_value;
use crate::kubernetes::workload::{completion_condition, submit_test, TestOutcome};
use crate::kubernetes::{self, ContextGuard, ContextStore, KubeconfigFile};
use crate::manifests::ManifestSet;
use crate::provision::{Provisioner, VclusterCli};
use crate::types::{K6Options, TestDefinition};
use crate::wait::WaitCondition;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use std::fmt;
use std::path::Path;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    New,
    /// The virtual cluster exists; the initial manifests may not be applied
    Created,
    Deployed,
    Running,
    Completed,
    Failed,
    Deleted,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::New => "new",
            LifecycleState::Created => "created",
            LifecycleState::Deployed => "deployed",
            LifecycleState::Running => "running",
            LifecycleState::Completed => "completed",
            LifecycleState::Failed => "failed",
            LifecycleState::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// One isolated test environment, backed by a virtual cluster whose
/// kubeconfig context carries the environment's name.
pub struct Environment<S: ContextStore = KubeconfigFile, P: Provisioner = VclusterCli> {
    name: String,
    parent_context: Option<String>,
    test: Option<TestDefinition>,
    manifests: ManifestSet,
    criteria: TestOutcome,
    store: S,
    provisioner: P,
    client: OnceCell<Client>,
    state: LifecycleState,
}

impl Environment {
    /// Environment initialized from `init_folder`: its manifests and, if
    /// present, its test.
    pub fn from_folder(name: &str, init_folder: &Path, config: &Config) -> Result<Self> {
        let manifests = ManifestSet::discover(init_folder)?;
        let test = TestDefinition::discover(init_folder)?.map(|td| {
            td.with_options(K6Options {
                version: config.k6_version.clone(),
                ..K6Options::default()
            })
        });

        let mut env = Self::new(
            name,
            KubeconfigFile::new(&config.kubeconfig),
            VclusterCli::new(&config.vcluster_bin, &config.kubeconfig),
        )
        .with_manifests(manifests);
        env.test = test;
        Ok(env)
    }
}

impl<S: ContextStore, P: Provisioner> Environment<S, P> {
    pub fn new(name: &str, store: S, provisioner: P) -> Self {
        Self {
            name: name.to_string(),
            parent_context: None,
            test: None,
            manifests: ManifestSet::empty(),
            criteria: TestOutcome::default(),
            store,
            provisioner,
            client: OnceCell::new(),
            state: LifecycleState::New,
        }
    }

    pub fn with_manifests(mut self, manifests: ManifestSet) -> Self {
        self.manifests = manifests;
        self
    }

    pub fn with_test(mut self, test: TestDefinition) -> Self {
        self.test = Some(test);
        self
    }

    pub fn with_criteria(mut self, criteria: TestOutcome) -> Self {
        self.criteria = criteria;
        self
    }

    /// Operate on a virtual cluster provisioned by an earlier process.
    pub fn attach(mut self) -> Self {
        if self.state == LifecycleState::New {
            self.state = LifecycleState::Deployed;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Context that was active when the environment was created
    pub fn parent_context(&self) -> Option<&str> {
        self.parent_context.as_deref()
    }

    pub fn test(&self) -> Option<&TestDefinition> {
        self.test.as_ref()
    }

    pub fn describe(&self) -> String {
        let test = self
            .test
            .as_ref()
            .map(|td| format!("{} ({})", td.location, td.mode))
            .unwrap_or_else(|| "none".to_string());
        let overlay = self
            .manifests
            .overlay
            .as_ref()
            .map(|dir| format!(", overlay {}", dir.display()))
            .unwrap_or_default();
        format!(
            "Environment {} [{}]: test {}, {} manifests{}, criteria {}, parent context {}",
            self.name,
            self.state,
            test,
            self.manifests.documents.len(),
            overlay,
            self.criteria,
            self.parent_context.as_deref().unwrap_or("unknown")
        )
    }

    fn lifecycle_error(&self, operation: &str) -> EnvironmentError {
        EnvironmentError::LifecycleError(format!(
            "cannot {} environment {} in state {}",
            operation, self.name, self.state
        ))
    }

    fn ensure_created(&self, operation: &str) -> Result<()> {
        match self.state {
            LifecycleState::New | LifecycleState::Deleted => Err(self.lifecycle_error(operation)),
            _ => Ok(()),
        }
    }

    async fn client(&self, guard: &ContextGuard<'_, S>) -> Result<Client> {
        self.client.get_or_try_init(|| guard.client()).await.cloned()
    }

    async fn deploy(&self, guard: &ContextGuard<'_, S>) -> Result<()> {
        let documents = self.manifests.resolve()?;
        if documents.is_empty() {
            return Ok(());
        }

        let client = self.client(guard).await?;
        let count = documents.len();
        for document in documents {
            apply_value(&client, document).await?;
        }
        info!("Deployed {} documents to {}", count, self.name);
        Ok(())
    }

    /// Provision the virtual cluster and apply the initial manifests.
    ///
    /// Retrying after a failed deploy provisions again, which the CLI
    /// tolerates for an existing cluster.
    #[instrument(skip(self), fields(env = %self.name))]
    pub async fn create(&mut self) -> Result<()> {
        if !matches!(self.state, LifecycleState::New | LifecycleState::Created) {
            return Err(self.lifecycle_error("create"));
        }

        let guard = ContextGuard::enter(&self.store, &self.name).await?;
        self.parent_context = Some(guard.original().to_string());

        let outcome = match self.provisioner.create(&self.name).await {
            Ok(()) => {
                self.state = LifecycleState::Created;
                self.deploy(&guard).await
            }
            Err(e) => Err(e),
        };

        let result = guard.finish(outcome);
        if result.is_ok() {
            self.state = LifecycleState::Deployed;
            info!("Environment {} is ready", self.name);
        }
        result
    }

    /// Apply every document of the manifest file at `file`.
    pub async fn apply(&mut self, file: &Path) -> Result<usize> {
        let spec = std::fs::read_to_string(file).map_err(|e| {
            EnvironmentError::ConfigurationError(format!("Failed to read {}: {}", file.display(), e))
        })?;
        self.apply_spec(&spec).await
    }

    /// Apply every document of `spec`; returns how many were applied.
    #[instrument(skip(self, spec), fields(env = %self.name))]
    pub async fn apply_spec(&mut self, spec: &str) -> Result<usize> {
        self.ensure_created("apply to")?;
        let guard = ContextGuard::enter(&self.store, &self.name).await?;
        let outcome = async {
            let client = self.client(&guard).await?;
            kubernetes::apply_spec(&client, spec).await
        }
        .await;
        guard.finish(outcome)
    }

    /// Start the test and block until it reaches the configured criteria.
    #[instrument(skip(self, cancel), fields(env = %self.name))]
    pub async fn run_test(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.ensure_created("run a test in")?;
        let test = self.test.clone().ok_or_else(|| {
            EnvironmentError::ConfigurationError(format!("environment {} has no test", self.name))
        })?;
        let condition = completion_condition(&self.name, &test, self.criteria)?;

        let guard = ContextGuard::enter(&self.store, &self.name).await?;
        let client = match self.client(&guard).await {
            Ok(client) => client,
            Err(e) => return guard.finish(Err(e)),
        };

        let outcome = match submit_test(&client, &self.name, &test).await {
            Ok(()) => {
                self.state = LifecycleState::Running;
                match condition.build(client) {
                    Ok(predicate) => predicate.poll(cancel).await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };

        let result = guard.finish(outcome);
        if self.state == LifecycleState::Running {
            self.state = if result.is_ok() {
                LifecycleState::Completed
            } else {
                LifecycleState::Failed
            };
        }
        result
    }

    /// Block until `condition` holds in the environment's cluster.
    #[instrument(skip(self, cancel), fields(env = %self.name, condition = %condition))]
    pub async fn wait(&mut self, condition: &WaitCondition, cancel: &CancellationToken) -> Result<()> {
        self.ensure_created("wait in")?;
        let guard = ContextGuard::enter(&self.store, &self.name).await?;
        let outcome = async {
            let client = self.client(&guard).await?;
            condition.build(client)?.poll(cancel).await
        }
        .await;
        guard.finish(outcome)
    }

    /// Number of pods in `namespace`, optionally limited by a label selector.
    #[instrument(skip(self), fields(env = %self.name))]
    pub async fn get_n(&mut self, namespace: &str, selector: Option<&str>) -> Result<usize> {
        self.ensure_created("count pods in")?;
        let guard = ContextGuard::enter(&self.store, &self.name).await?;
        let outcome = async {
            let client = self.client(&guard).await?;
            let pods: Api<Pod> = Api::namespaced(client, namespace);
            let lp = match selector {
                Some(selector) => ListParams::default().labels(selector),
                None => ListParams::default(),
            };
            Ok(pods.list(&lp).await?.items.len())
        }
        .await;
        guard.finish(outcome)
    }

    /// Tear down the virtual cluster and drop its context.
    ///
    /// When the environment's own context is the active one there is nothing
    /// to restore afterwards.
    #[instrument(skip(self), fields(env = %self.name))]
    pub async fn delete(&mut self) -> Result<()> {
        if self.state == LifecycleState::Deleted {
            return Err(self.lifecycle_error("delete"));
        }

        let guard = ContextGuard::enter(&self.store, &self.name).await?;
        let outcome = self.teardown().await;
        let result = if guard.original() == self.name {
            guard.release(outcome)
        } else {
            guard.finish(outcome)
        };

        if result.is_ok() {
            self.state = LifecycleState::Deleted;
            info!("Environment {} deleted", self.name);
        }
        result
    }

    async fn teardown(&self) -> Result<()> {
        self.provisioner.delete(&self.name).await?;
        if !self.store.delete_context(&self.name)? {
            warn!("Context {} was already removed", self.name);
        }
        Ok(())
    }
}
