// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rendering of kustomize-style overlay directories.
//!
//! Supported are `resources` (manifest files and nested overlay
//! directories), `namespace` and `commonLabels`. Remote resources are
//! rejected.

use crate::constants::files;
use crate::error::{EnvironmentError, Result};
use crate::kubernetes::split_documents;
use crate::manifests::order::dependency_order;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_DEPTH: usize = 16;

/// Kinds the namespace override leaves alone
const CLUSTER_SCOPED: [&str; 13] = [
    "Namespace",
    "CustomResourceDefinition",
    "ClusterRole",
    "ClusterRoleBinding",
    "StorageClass",
    "PersistentVolume",
    "PriorityClass",
    "IngressClass",
    "RuntimeClass",
    "APIService",
    "PodSecurityPolicy",
    "MutatingWebhookConfiguration",
    "ValidatingWebhookConfiguration",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Kustomization {
    resources: Vec<String>,
    namespace: Option<String>,
    common_labels: BTreeMap<String, String>,
}

/// The kustomization file of `dir`, if it has one
pub fn kustomization_file(dir: &Path) -> Option<PathBuf> {
    files::KUSTOMIZATION
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Render the overlay in `dir` into documents ordered for applying.
pub fn render(dir: &Path) -> Result<Vec<Value>> {
    let documents = load(dir, 0)?;
    debug!("Rendered {} documents from {}", documents.len(), dir.display());
    Ok(dependency_order(documents))
}

fn read_kustomization(dir: &Path) -> Result<Kustomization> {
    let path = kustomization_file(dir).ok_or_else(|| {
        EnvironmentError::ConfigurationError(format!("no kustomization file in {}", dir.display()))
    })?;
    let text = std::fs::read_to_string(&path)?;
    if text.trim().is_empty() {
        return Ok(Kustomization::default());
    }
    serde_yaml::from_str(&text).map_err(|e| {
        EnvironmentError::ConfigurationError(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn load(dir: &Path, depth: usize) -> Result<Vec<Value>> {
    if depth > MAX_DEPTH {
        return Err(EnvironmentError::ConfigurationError(format!(
            "overlays nested too deep at {}",
            dir.display()
        )));
    }

    let kustomization = read_kustomization(dir)?;
    let mut documents = Vec::new();
    for resource in &kustomization.resources {
        if resource.contains("://") {
            return Err(EnvironmentError::ConfigurationError(format!(
                "remote resource {} is not supported",
                resource
            )));
        }
        let path = dir.join(resource);
        if path.is_dir() {
            documents.extend(load(&path, depth + 1)?);
        } else {
            let text = std::fs::read_to_string(&path).map_err(|e| {
                EnvironmentError::ConfigurationError(format!(
                    "Failed to read resource {}: {}",
                    path.display(),
                    e
                ))
            })?;
            documents.extend(split_documents(&text)?);
        }
    }

    for document in &mut documents {
        transform(document, &kustomization);
    }
    Ok(documents)
}

fn metadata_mut(document: &mut Value) -> Option<&mut Map<String, Value>> {
    document
        .as_object_mut()?
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

fn transform(document: &mut Value, kustomization: &Kustomization) {
    let cluster_scoped = document["kind"]
        .as_str()
        .is_some_and(|kind| CLUSTER_SCOPED.contains(&kind));
    let Some(metadata) = metadata_mut(document) else {
        return;
    };

    if let Some(namespace) = &kustomization.namespace {
        if !cluster_scoped {
            metadata.insert("namespace".to_string(), Value::String(namespace.clone()));
        }
    }

    if !kustomization.common_labels.is_empty() {
        let labels = metadata
            .entry("labels")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(labels) = labels.as_object_mut() {
            for (key, value) in &kustomization.common_labels {
                labels.insert(key.clone(), Value::String(value.clone()));
            }
        }
    }
}
