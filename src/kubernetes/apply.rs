// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Server-side apply of generic manifest documents

use crate::constants::{DEFAULT_NAMESPACE, FIELD_MANAGER};
use crate::error::{EnvironmentError, Result};
use crate::kubernetes::discovery::resolve_api_version;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::discovery::Scope;
use kube::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Decode every non-empty YAML or JSON document in `text`.
pub fn split_documents(text: &str) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|e| {
            EnvironmentError::ConfigurationError(format!("Failed to decode manifest: {}", e))
        })?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

/// Decode exactly one document from `text`.
pub fn single_document(text: &str) -> Result<Value> {
    let mut documents = split_documents(text)?;
    match documents.len() {
        1 => Ok(documents.remove(0)),
        0 => Err(EnvironmentError::ConfigurationError(
            "manifest contains no document".to_string(),
        )),
        n => Err(EnvironmentError::ConfigurationError(format!(
            "expected one manifest document, found {}",
            n
        ))),
    }
}

/// Identity of a manifest document: the fields apply needs before decoding it
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestIdentity {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ManifestIdentity {
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(EnvironmentError::ConfigurationError(
                "manifest document is not an object".to_string(),
            ));
        }
        let field = |v: &Value, what: &str| {
            v.as_str()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .ok_or_else(|| EnvironmentError::ConfigurationError(format!("manifest is missing {}", what)))
        };

        Ok(Self {
            api_version: field(&value["apiVersion"], "apiVersion")?,
            kind: field(&value["kind"], "kind")?,
            name: field(&value["metadata"]["name"], "metadata.name")?,
            namespace: value["metadata"]["namespace"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
        })
    }
}

/// Namespace an object of a namespaced type is applied to, defaulting it in place.
pub fn default_namespace(obj: &mut DynamicObject) -> String {
    match obj.metadata.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => ns.to_string(),
        _ => {
            obj.metadata.namespace = Some(DEFAULT_NAMESPACE.to_string());
            DEFAULT_NAMESPACE.to_string()
        }
    }
}

/// Apply one already-decoded document with server-side apply.
#[instrument(skip(client, value))]
pub async fn apply_value(client: &Client, value: Value) -> Result<DynamicObject> {
    let identity = ManifestIdentity::from_value(&value)?;
    let (ar, caps) = resolve_api_version(client, &identity.api_version, &identity.kind).await?;

    let mut obj: DynamicObject = serde_json::from_value(value).map_err(|e| {
        EnvironmentError::ConfigurationError(format!(
            "Failed to decode {} {}: {}",
            identity.kind, identity.name, e
        ))
    })?;

    let api: Api<DynamicObject> = match caps.scope {
        Scope::Namespaced => {
            let namespace = default_namespace(&mut obj);
            Api::namespaced_with(client.clone(), &namespace, &ar)
        }
        Scope::Cluster => Api::all_with(client.clone(), &ar),
    };

    debug!(
        "Applying {} {} (namespace {:?})",
        identity.kind, identity.name, obj.metadata.namespace
    );

    let pp = PatchParams::apply(FIELD_MANAGER).force();
    let applied = api.patch(&identity.name, &pp, &Patch::Apply(&obj)).await?;

    info!("Applied {} {}", identity.kind, identity.name);
    Ok(applied)
}

/// Apply a manifest text that must hold exactly one document.
pub async fn apply_document(client: &Client, document: &str) -> Result<DynamicObject> {
    apply_value(client, single_document(document)?).await
}

/// Apply every document of a manifest text in order; returns how many were applied.
pub async fn apply_spec(client: &Client, spec: &str) -> Result<usize> {
    let documents = split_documents(spec)?;
    let count = documents.len();
    for document in documents {
        apply_value(client, document).await?;
    }
    Ok(count)
}
