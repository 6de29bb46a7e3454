// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource type discovery

use crate::error::{EnvironmentError, Result};
use kube::core::GroupVersionKind;
use kube::discovery::{pinned_kind, ApiCapabilities, ApiResource, Discovery};
use kube::Client;
use tracing::{debug, instrument};

/// Split an apiVersion into group and version; the core group is empty.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Find the preferred resource serving `kind`, searching every API group.
///
/// The core group is searched first, then named groups alphabetically, so a
/// kind served by several groups resolves the same way on every call.
#[instrument(skip(client))]
pub async fn discover_kind(client: &Client, kind: &str) -> Result<(ApiResource, ApiCapabilities)> {
    let discovery = Discovery::new(client.clone())
        .run()
        .await
        .map_err(|e| EnvironmentError::ResourceLookupError(format!("API discovery failed: {}", e)))?;

    for group in discovery.groups_alphabetical() {
        for (ar, caps) in group.recommended_resources() {
            if ar.kind == kind {
                debug!("Kind {} is served as {}/{}", kind, ar.api_version, ar.plural);
                return Ok((ar, caps));
            }
        }
    }

    Err(EnvironmentError::ResourceLookupError(format!(
        "kind {} not found in API discovery",
        kind
    )))
}

/// Resolve the resource for an exact apiVersion and kind.
#[instrument(skip(client))]
pub async fn resolve_api_version(
    client: &Client,
    api_version: &str,
    kind: &str,
) -> Result<(ApiResource, ApiCapabilities)> {
    let (group, version) = parse_api_version(api_version);
    let gvk = GroupVersionKind::gvk(&group, &version, kind);
    pinned_kind(client, &gvk).await.map_err(|e| {
        EnvironmentError::ResourceLookupError(format!(
            "no resource serves {} {}: {}",
            api_version, kind, e
        ))
    })
}
