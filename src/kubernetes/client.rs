// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Context-bound client creation

use crate::error::{EnvironmentError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use tracing::{debug, instrument};

/// Create a Kubernetes client pinned to one named context of a kubeconfig.
///
/// The kubeconfig's current-context is ignored, so the returned client keeps
/// talking to `context` no matter what other processes switch to later.
#[instrument(skip(kubeconfig))]
pub async fn client_for_context(kubeconfig: Kubeconfig, context: &str) -> Result<Client> {
    if !kubeconfig.contexts.iter().any(|c| c.name == context) {
        return Err(EnvironmentError::KubeconfigError(format!(
            "context {} doesn't exist",
            context
        )));
    }

    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        ..Default::default()
    };
    let client_config = KConfig::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| {
            EnvironmentError::KubeconfigError(format!(
                "Failed to create config for context {}: {}",
                context, e
            ))
        })?;

    debug!("Connecting to {} through context {}", client_config.cluster_url, context);

    Client::try_from(client_config)
        .map_err(|e| EnvironmentError::KubeconfigError(format!("Failed to create client: {}", e)))
}
