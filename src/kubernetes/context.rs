// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster-access context isolation.
//!
//! Every environment talks to its cluster through a client pinned to the
//! environment's context, so the kubeconfig's current-context is never switched
//! to run an operation. It still has to be guarded: the virtual cluster CLI
//! switches it as a side effect, and the caller expects to find its own
//! context active once an operation returns.

use crate::error::{EnvironmentError, Result};
use crate::kubernetes::client::client_for_context;
use kube::config::Kubeconfig;
use kube::Client;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Serializes read-modify-write cycles on kubeconfig files within the process
static KUBECONFIG_LOCK: Mutex<()> = Mutex::new(());

/// Held from `ContextGuard::enter` until the guard restores, so no guarded
/// section observes the context another one is in the middle of changing
static GUARDED_SECTION: AsyncMutex<()> = AsyncMutex::const_new(());

/// Where cluster-access contexts live and how to reach them.
pub trait ContextStore: Send + Sync {
    /// Name of the currently active context
    fn current_context(&self) -> Result<String>;

    /// Make `name` the active context; fails if it does not exist
    fn set_current_context(&self, name: &str) -> Result<()>;

    /// Remove the context entry `name`; `false` if there was none
    fn delete_context(&self, name: &str) -> Result<bool>;

    /// Build a client bound to `name`, independent of the active context
    fn client_for(&self, name: &str) -> impl Future<Output = Result<Client>> + Send;
}

/// Contexts stored in a kubeconfig file on disk
#[derive(Debug, Clone)]
pub struct KubeconfigFile {
    path: PathBuf,
}

impl KubeconfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Kubeconfig> {
        Kubeconfig::read_from(&self.path).map_err(|e| {
            EnvironmentError::KubeconfigError(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write(&self, kubeconfig: &Kubeconfig) -> Result<()> {
        let data = serde_yaml::to_string(kubeconfig).map_err(|e| {
            EnvironmentError::KubeconfigError(format!("Failed to serialize kubeconfig: {}", e))
        })?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    fn modify<F, T>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Kubeconfig) -> Result<T>,
    {
        let _lock = KUBECONFIG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut kubeconfig = self.read()?;
        let value = change(&mut kubeconfig)?;
        self.write(&kubeconfig)?;
        Ok(value)
    }
}

fn ensure_context(kubeconfig: &Kubeconfig, name: &str) -> Result<()> {
    if kubeconfig.contexts.iter().any(|c| c.name == name) {
        Ok(())
    } else {
        Err(EnvironmentError::KubeconfigError(format!(
            "context {} doesn't exist",
            name
        )))
    }
}

impl ContextStore for KubeconfigFile {
    fn current_context(&self) -> Result<String> {
        self.read()?.current_context.ok_or_else(|| {
            EnvironmentError::KubeconfigError(format!(
                "{} has no current-context",
                self.path.display()
            ))
        })
    }

    fn set_current_context(&self, name: &str) -> Result<()> {
        self.modify(|kubeconfig| {
            ensure_context(kubeconfig, name)?;
            kubeconfig.current_context = Some(name.to_string());
            Ok(())
        })
    }

    fn delete_context(&self, name: &str) -> Result<bool> {
        self.modify(|kubeconfig| {
            let before = kubeconfig.contexts.len();
            kubeconfig.contexts.retain(|c| c.name != name);
            if kubeconfig.current_context.as_deref() == Some(name) {
                kubeconfig.current_context = None;
            }
            Ok(kubeconfig.contexts.len() < before)
        })
    }

    async fn client_for(&self, name: &str) -> Result<Client> {
        let kubeconfig = self.read()?;
        client_for_context(kubeconfig, name).await
    }
}

/// Scoped save and restore of the active context around one operation.
///
/// `enter` waits for any other guarded section in the process to end, then
/// records the active context; `finish` restores it and decides which error
/// the caller sees. A guard dropped without `finish` (early return, cancelled
/// future) restores on a best-effort basis.
pub struct ContextGuard<'a, S: ContextStore> {
    store: &'a S,
    original: String,
    target: String,
    finished: bool,
    _section: MutexGuard<'static, ()>,
}

impl<'a, S: ContextStore> ContextGuard<'a, S> {
    pub async fn enter(store: &'a S, target: &str) -> Result<Self> {
        let section = GUARDED_SECTION.lock().await;
        let original = store.current_context()?;
        debug!("Entering context {} from {}", target, original);
        Ok(Self {
            store,
            original,
            target: target.to_string(),
            finished: false,
            _section: section,
        })
    }

    /// Context that was active when the guard was entered
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Client bound to the guarded context
    pub async fn client(&self) -> Result<Client> {
        self.store.client_for(&self.target).await
    }

    fn restore(&mut self) -> Result<()> {
        self.finished = true;
        let current = self.store.current_context().map_err(|e| {
            EnvironmentError::ContextSwitchError(format!("reading active context: {}", e))
        })?;
        if current == self.original {
            return Ok(());
        }

        info!("Restoring context {} (found {})", self.original, current);
        self.store
            .set_current_context(&self.original)
            .map_err(|e| {
                EnvironmentError::ContextSwitchError(format!(
                    "switching from {} back to {}: {}",
                    current, self.original, e
                ))
            })
    }

    /// Restore the original context and combine its result with the
    /// operation's: the operation's error wins, a restore error replaces a
    /// success.
    pub fn finish<T>(mut self, outcome: Result<T>) -> Result<T> {
        let restored = self.restore();
        match (outcome, restored) {
            (Err(e), Err(restore_err)) => {
                warn!("Also failed to restore context after error: {}", restore_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(_), Err(restore_err)) => Err(restore_err),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    /// End the section without restoring, for an operation that removed the
    /// original context itself.
    pub fn release<T>(mut self, outcome: Result<T>) -> Result<T> {
        self.finished = true;
        outcome
    }
}

impl<S: ContextStore> Drop for ContextGuard<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.restore() {
                error!("Context {} left active: {}", self.target, e);
            }
        }
    }
}
