// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvironmentError {
    /// Malformed input to a constructor: condition, manifest, duration string.
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// A parsed wait condition does not identify a resource and a state.
    #[error("Invalid wait condition: {0}")]
    ValidationError(String),

    /// Discovery or REST mapping failed; aborts a poll immediately.
    #[error("Resource lookup failed: {0}")]
    ResourceLookupError(String),

    #[error("Timed out: {0}")]
    TimeoutError(String),

    /// The original cluster context could not be restored after an operation.
    #[error("Failed to restore cluster context: {0}")]
    ContextSwitchError(String),

    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to parse kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Virtual cluster provisioning failed: {0}")]
    ProvisionError(String),

    #[error("Environment is not usable: {0}")]
    LifecycleError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EnvironmentError>;
