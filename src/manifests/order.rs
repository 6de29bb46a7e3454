// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Dependency ordering of rendered documents.
//!
//! A document that references another one (its namespace, a ConfigMap or
//! Secret it mounts, a `*Ref` to a custom resource, the CRD defining its
//! kind) is placed after it. Documents without a dependency between them keep
//! the conventional kind order, then their listing order.

use crate::kubernetes::parse_api_version;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

const ORDER_FIRST: [&str; 22] = [
    "Namespace",
    "ResourceQuota",
    "StorageClass",
    "CustomResourceDefinition",
    "ServiceAccount",
    "PodSecurityPolicy",
    "Role",
    "ClusterRole",
    "RoleBinding",
    "ClusterRoleBinding",
    "ConfigMap",
    "Secret",
    "Endpoints",
    "Service",
    "LimitRange",
    "PriorityClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "Deployment",
    "StatefulSet",
    "CronJob",
    "PodDisruptionBudget",
];

const ORDER_LAST: [&str; 2] = ["MutatingWebhookConfiguration", "ValidatingWebhookConfiguration"];

/// Position of a kind in the conventional apply order
pub fn kind_priority(kind: &str) -> usize {
    if let Some(i) = ORDER_FIRST.iter().position(|k| *k == kind) {
        i
    } else if let Some(i) = ORDER_LAST.iter().position(|k| *k == kind) {
        ORDER_FIRST.len() + 1 + i
    } else {
        ORDER_FIRST.len()
    }
}

/// Something a document needs to exist before it is applied
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reference {
    Namespace(String),
    Named { kind: Option<String>, name: String },
}

struct Node<'a> {
    kind: &'a str,
    name: &'a str,
    namespace: Option<&'a str>,
    group: String,
    /// Group and kind served, for CustomResourceDefinitions
    defines: Option<(&'a str, &'a str)>,
}

impl<'a> Node<'a> {
    fn new(doc: &'a Value) -> Self {
        let kind = doc["kind"].as_str().unwrap_or_default();
        let defines = if kind == "CustomResourceDefinition" {
            doc["spec"]["group"]
                .as_str()
                .zip(doc["spec"]["names"]["kind"].as_str())
        } else {
            None
        };
        Self {
            kind,
            name: doc["metadata"]["name"].as_str().unwrap_or_default(),
            namespace: doc["metadata"]["namespace"].as_str(),
            group: parse_api_version(doc["apiVersion"].as_str().unwrap_or_default()).0,
            defines,
        }
    }

    fn satisfies(&self, reference: &Reference, dependent: &Node) -> bool {
        match reference {
            Reference::Namespace(ns) => self.kind == "Namespace" && self.name == ns,
            Reference::Named { kind, name } => {
                self.name == name
                    && kind.as_deref().map_or(true, |k| k == self.kind)
                    && match (self.namespace, dependent.namespace) {
                        (Some(a), Some(b)) => a == b,
                        _ => true,
                    }
            }
        }
    }

    fn defines_kind_of(&self, dependent: &Node) -> bool {
        self.defines
            .is_some_and(|(group, kind)| group == dependent.group && kind == dependent.kind)
    }
}

fn ref_kind(key: &str) -> Option<String> {
    let kind = match key {
        "configMapRef" | "configMapKeyRef" | "configMap" => "ConfigMap",
        "secretRef" | "secretKeyRef" | "secret" => "Secret",
        _ => return None,
    };
    Some(kind.to_string())
}

fn collect_references(map: &Map<String, Value>, out: &mut Vec<Reference>) {
    for (key, value) in map {
        let named = |kind: &str| Reference::Named {
            kind: Some(kind.to_string()),
            name: value.as_str().unwrap_or_default().to_string(),
        };
        match (key.as_str(), value) {
            ("serviceAccountName", Value::String(_)) => out.push(named("ServiceAccount")),
            ("claimName", Value::String(_)) => out.push(named("PersistentVolumeClaim")),
            ("secretName", Value::String(_)) => out.push(named("Secret")),
            ("imagePullSecrets", Value::Array(items)) => {
                for name in items.iter().filter_map(|i| i["name"].as_str()) {
                    out.push(Reference::Named {
                        kind: Some("Secret".to_string()),
                        name: name.to_string(),
                    });
                }
            }
            (key, Value::Object(inner))
                if key.ends_with("Ref") || key == "configMap" || key == "secret" =>
            {
                if let Some(name) = inner.get("name").and_then(Value::as_str) {
                    let kind = inner
                        .get("kind")
                        .and_then(Value::as_str)
                        .map(|k| k.to_string())
                        .or_else(|| ref_kind(key));
                    out.push(Reference::Named {
                        kind,
                        name: name.to_string(),
                    });
                }
            }
            _ => {}
        }

        match value {
            Value::Object(inner) => collect_references(inner, out),
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(inner) = item {
                        collect_references(inner, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn references(doc: &Value) -> Vec<Reference> {
    let mut out = Vec::new();
    if let Some(ns) = doc["metadata"]["namespace"].as_str() {
        out.push(Reference::Namespace(ns.to_string()));
    }
    if let Some(map) = doc.as_object() {
        let body: Map<String, Value> = map
            .iter()
            .filter(|(k, _)| k.as_str() != "metadata")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        collect_references(&body, &mut out);
    }
    out.retain(|r| !matches!(r, Reference::Named { name, .. } if name.is_empty()));
    out
}

/// Order documents so that each one comes after everything it references.
///
/// Reference cycles cannot be honored; documents caught in one keep their
/// listing order after everything that could be ordered.
pub fn dependency_order(docs: Vec<Value>) -> Vec<Value> {
    let order = {
        let nodes: Vec<Node> = docs.iter().map(Node::new).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); docs.len()];
        let mut indegree = vec![0usize; docs.len()];

        for (j, doc) in docs.iter().enumerate() {
            let refs = references(doc);
            for (i, node) in nodes.iter().enumerate() {
                if i == j {
                    continue;
                }
                let depends = node.defines_kind_of(&nodes[j])
                    || refs.iter().any(|r| node.satisfies(r, &nodes[j]));
                if depends {
                    dependents[i].push(j);
                    indegree[j] += 1;
                }
            }
        }

        let mut ready: BTreeSet<(usize, usize)> = (0..docs.len())
            .filter(|&i| indegree[i] == 0)
            .map(|i| (kind_priority(nodes[i].kind), i))
            .collect();
        let mut order = Vec::with_capacity(docs.len());
        while let Some(next) = ready.pop_first() {
            let i = next.1;
            order.push(i);
            for &j in &dependents[i] {
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    ready.insert((kind_priority(nodes[j].kind), j));
                }
            }
        }

        let placed: BTreeSet<usize> = order.iter().copied().collect();
        order.extend((0..docs.len()).filter(|i| !placed.contains(i)));
        order
    };

    let mut slots: Vec<Option<Value>> = docs.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}
