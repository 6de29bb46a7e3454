// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking the Kubernetes API server and the collaborators
//! that sit around an environment.

use crate::error::{EnvironmentError, Result};
use crate::kubernetes::ContextStore;
use crate::provision::Provisioner;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A request the mock received, kept for assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: String,
}

type Key = (String, String);

/// A mock HTTP service that returns predefined responses based on request paths.
///
/// Registering the same method and path more than once queues the responses;
/// the last one keeps being served once the queue is drained.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<Key, VecDeque<(u16, String)>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back((status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for PATCH requests matching the exact path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    /// Serve legacy discovery for the core group and the given named groups.
    ///
    /// Each resource is `(group_version, plural, kind, namespaced)`.
    pub fn with_discovery(self, resources: &[(&str, &str, &str, bool)]) -> Self {
        let mut by_gv: Vec<(&str, Vec<(&str, &str, bool)>)> = Vec::new();
        for (gv, plural, kind, namespaced) in resources {
            match by_gv.iter_mut().find(|(g, _)| g == gv) {
                Some((_, list)) => list.push((plural, kind, *namespaced)),
                None => by_gv.push((gv, vec![(plural, kind, *namespaced)])),
            }
        }
        if !by_gv.iter().any(|(gv, _)| *gv == "v1") {
            by_gv.push(("v1", Vec::new()));
        }

        let named: Vec<&str> = by_gv
            .iter()
            .map(|(gv, _)| *gv)
            .filter(|gv| gv.contains('/'))
            .collect();

        let mut mock = self
            .on_get("/api", 200, &core_versions_json())
            .on_get("/apis", 200, &api_group_list_json(&named));
        for (gv, list) in &by_gv {
            let path = if gv.contains('/') {
                format!("/apis/{}", gv)
            } else {
                format!("/api/{}", gv)
            };
            mock = mock.on_get(&path, 200, &api_resource_list_json(gv, list));
        }
        mock
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    /// All requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests received so far with the given method
    pub fn requests_with_method(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let mut responses = self.responses.lock().unwrap();
        let queue = responses.get_mut(&(method.to_string(), path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let (parts, body) = req.into_parts();
        let method = parts.method.to_string();
        let path = parts.uri.path().to_string();
        let query = parts.uri.query().map(|q| q.to_string());

        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let bytes: Bytes = body.collect().await.map_err(tower::BoxError::from)?.to_bytes();
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                query,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });

            let (status, body) = response.unwrap_or_else(|| (404, not_found_json("resource", "unknown")));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(Bytes::from(body)))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

fn core_versions_json() -> String {
    serde_json::json!({
        "kind": "APIVersions",
        "apiVersion": "v1",
        "versions": ["v1"],
        "serverAddressByClientCIDRs": [
            { "clientCIDR": "0.0.0.0/0", "serverAddress": "10.0.0.1:6443" }
        ]
    })
    .to_string()
}

fn api_group_list_json(group_versions: &[&str]) -> String {
    let groups: Vec<serde_json::Value> = group_versions
        .iter()
        .filter_map(|gv| gv.split_once('/'))
        .map(|(group, version)| {
            let gv = serde_json::json!({
                "groupVersion": format!("{}/{}", group, version),
                "version": version
            });
            serde_json::json!({
                "name": group,
                "versions": [gv.clone()],
                "preferredVersion": gv
            })
        })
        .collect();
    serde_json::json!({
        "kind": "APIGroupList",
        "apiVersion": "v1",
        "groups": groups
    })
    .to_string()
}

fn api_resource_list_json(group_version: &str, resources: &[(&str, &str, bool)]) -> String {
    let resources: Vec<serde_json::Value> = resources
        .iter()
        .map(|(plural, kind, namespaced)| {
            serde_json::json!({
                "name": plural,
                "singularName": kind.to_lowercase(),
                "namespaced": namespaced,
                "kind": kind,
                "verbs": ["create", "delete", "get", "list", "patch", "update", "watch"]
            })
        })
        .collect();
    serde_json::json!({
        "kind": "APIResourceList",
        "apiVersion": "v1",
        "groupVersion": group_version,
        "resources": resources
    })
    .to_string()
}

/// Create an event list JSON response, one event per `(kind, name, reason)`
pub fn event_list_json(events: &[(&str, &str, &str)]) -> String {
    let items: Vec<serde_json::Value> = events
        .iter()
        .enumerate()
        .map(|(i, (kind, name, reason))| {
            serde_json::json!({
                "metadata": { "name": format!("{}.{}", name, i), "namespace": "default" },
                "involvedObject": { "kind": kind, "name": name, "namespace": "default" },
                "reason": reason,
                "type": "Normal"
            })
        })
        .collect();
    serde_json::json!({
        "kind": "EventList",
        "apiVersion": "v1",
        "metadata": { "resourceVersion": "1" },
        "items": items
    })
    .to_string()
}

/// In-memory kubeconfig contexts that hand out clients backed by a [`MockService`].
#[derive(Clone)]
pub struct MemoryContextStore {
    current: Arc<Mutex<String>>,
    contexts: Arc<Mutex<BTreeSet<String>>>,
    mock: MockService,
    broken_restore: Arc<Mutex<bool>>,
}

impl MemoryContextStore {
    pub fn new(current: &str, mock: MockService) -> Self {
        Self {
            current: Arc::new(Mutex::new(current.to_string())),
            contexts: Arc::new(Mutex::new(BTreeSet::from([current.to_string()]))),
            mock,
            broken_restore: Arc::new(Mutex::new(false)),
        }
    }

    pub fn add_context(&self, name: &str) {
        self.contexts.lock().unwrap().insert(name.to_string());
    }

    pub fn has_context(&self, name: &str) -> bool {
        self.contexts.lock().unwrap().contains(name)
    }

    /// Switch without any checks, the way an external tool would
    pub fn force_current(&self, name: &str) {
        *self.current.lock().unwrap() = name.to_string();
    }

    /// Make every later `set_current_context` call fail
    pub fn break_restore(&self) {
        *self.broken_restore.lock().unwrap() = true;
    }

    pub fn current(&self) -> String {
        self.current.lock().unwrap().clone()
    }
}

impl ContextStore for MemoryContextStore {
    fn current_context(&self) -> Result<String> {
        Ok(self.current())
    }

    fn set_current_context(&self, name: &str) -> Result<()> {
        if *self.broken_restore.lock().unwrap() {
            return Err(EnvironmentError::KubeconfigError("kubeconfig is read-only".to_string()));
        }
        if !self.has_context(name) {
            return Err(EnvironmentError::KubeconfigError(format!(
                "context {} doesn't exist",
                name
            )));
        }
        self.force_current(name);
        Ok(())
    }

    fn delete_context(&self, name: &str) -> Result<bool> {
        Ok(self.contexts.lock().unwrap().remove(name))
    }

    async fn client_for(&self, name: &str) -> Result<Client> {
        if !self.has_context(name) {
            return Err(EnvironmentError::KubeconfigError(format!(
                "context {} doesn't exist",
                name
            )));
        }
        Ok(self.mock.clone().into_client())
    }
}

/// Provisioner that behaves like the vcluster CLI: creating a cluster adds a
/// context named after it and makes it current.
#[derive(Clone)]
pub struct FakeProvisioner {
    store: MemoryContextStore,
    fail_create: bool,
    fail_delete: bool,
    pub created: Arc<Mutex<Vec<String>>>,
    pub deleted: Arc<Mutex<Vec<String>>>,
}

impl FakeProvisioner {
    pub fn new(store: MemoryContextStore) -> Self {
        Self {
            store,
            fail_create: false,
            fail_delete: false,
            created: Arc::new(Mutex::new(Vec::new())),
            deleted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(store: MemoryContextStore) -> Self {
        Self {
            fail_create: true,
            ..Self::new(store)
        }
    }

    /// Deleting switches to the cluster's context and then fails
    pub fn failing_delete(store: MemoryContextStore) -> Self {
        Self {
            fail_delete: true,
            ..Self::new(store)
        }
    }
}

impl Provisioner for FakeProvisioner {
    async fn create(&self, name: &str) -> Result<()> {
        if self.fail_create {
            self.store.add_context(name);
            self.store.force_current(name);
            return Err(EnvironmentError::ProvisionError(format!(
                "vcluster create {} exited with status 1",
                name
            )));
        }
        self.created.lock().unwrap().push(name.to_string());
        self.store.add_context(name);
        self.store.force_current(name);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        if self.fail_delete {
            self.store.force_current(name);
            return Err(EnvironmentError::ProvisionError(format!(
                "vcluster delete {} exited with status 1",
                name
            )));
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
