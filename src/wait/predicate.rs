// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Polling predicates bound to a cluster-access client.
//!
//! Failure policy: a kind that cannot be resolved to a resource type is fatal
//! and aborts the poll. A target object that cannot be fetched, or that lacks
//! the expected condition or status field, is not ready yet; so is an event
//! list that cannot be read. Objects are often created or reconciled after
//! the wait starts.

use crate::error::{EnvironmentError, Result};
use crate::kubernetes::discover_kind;
use crate::wait::condition::{StateType, WaitCondition};
use k8s_openapi::api::core::v1::Event;
use kube::api::{Api, DynamicObject, ListParams};
use kube::discovery::{ApiResource, Scope};
use kube::Client;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

/// A wait condition bound to the client of the cluster it is evaluated in
pub struct Predicate {
    client: Client,
    condition: WaitCondition,
    resolved: OnceCell<(ApiResource, Scope)>,
}

impl WaitCondition {
    /// Bind this condition to `client`; fails for conditions that do not validate.
    pub fn build(&self, client: Client) -> Result<Predicate> {
        if !self.validate() {
            return Err(EnvironmentError::ValidationError(format!(
                "cannot wait for {}",
                self
            )));
        }
        Ok(Predicate {
            client,
            condition: self.clone(),
            resolved: OnceCell::new(),
        })
    }
}

impl Predicate {
    pub fn condition(&self) -> &WaitCondition {
        &self.condition
    }

    /// Evaluate once: `Ok(true)` when the state is reached, `Ok(false)` when
    /// not yet, `Err` when polling should stop.
    #[instrument(skip(self), fields(condition = %self.condition))]
    pub async fn check(&self) -> Result<bool> {
        match self.condition.state_type() {
            StateType::Event => self.check_events().await,
            StateType::StatusCondition | StateType::StatusCustom => self.check_status().await,
            StateType::Invalid => Err(EnvironmentError::ValidationError(format!(
                "cannot wait for {}",
                self.condition
            ))),
        }
    }

    async fn check_events(&self) -> Result<bool> {
        let resource = &self.condition.resource;
        let events: Api<Event> = Api::namespaced(self.client.clone(), &resource.namespace);
        let lp = ListParams::default().fields(&format!(
            "involvedObject.kind={},involvedObject.name={}",
            resource.kind, resource.name
        ));

        match events.list(&lp).await {
            Ok(list) => Ok(events_match(
                &list.items,
                &resource.kind,
                &resource.name,
                &self.condition.state.reason,
            )),
            Err(e) => {
                debug!("Listing events for {} failed, not ready yet: {}", resource, e);
                Ok(false)
            }
        }
    }

    async fn resolve(&self) -> Result<&(ApiResource, Scope)> {
        self.resolved
            .get_or_try_init(|| async {
                let (ar, caps) = discover_kind(&self.client, &self.condition.resource.kind).await?;
                Ok::<_, EnvironmentError>((ar, caps.scope))
            })
            .await
    }

    async fn check_status(&self) -> Result<bool> {
        let (ar, scope) = self.resolve().await?;
        let resource = &self.condition.resource;
        let api: Api<DynamicObject> = match scope {
            Scope::Namespaced => Api::namespaced_with(self.client.clone(), &resource.namespace, ar),
            Scope::Cluster => Api::all_with(self.client.clone(), ar),
        };

        let obj = match api.get_opt(&resource.name).await {
            Ok(Some(obj)) => obj,
            Ok(None) => {
                debug!("{} does not exist yet", resource);
                return Ok(false);
            }
            Err(e) => {
                debug!("Fetching {} failed, not ready yet: {}", resource, e);
                return Ok(false);
            }
        };

        let state = &self.condition.state;
        let done = match state.state_type() {
            StateType::StatusCondition => {
                condition_status(&obj.data, &state.condition_type) == Some(state.status.as_str())
            }
            _ => custom_status(&obj.data, &state.status_key) == Some(state.status_value.as_str()),
        };
        Ok(done)
    }
}

/// Whether any event about `kind`/`name` carries `reason`
pub fn events_match(events: &[Event], kind: &str, name: &str, reason: &str) -> bool {
    events.iter().any(|event| {
        let involved = &event.involved_object;
        involved.kind.as_deref().map_or(true, |k| k == kind)
            && involved.name.as_deref().map_or(true, |n| n == name)
            && event.reason.as_deref() == Some(reason)
    })
}

/// Status of the `status.conditions` entry with the given type
pub fn condition_status<'a>(obj: &'a Value, condition_type: &str) -> Option<&'a str> {
    obj.get("status")?
        .get("conditions")?
        .as_array()?
        .iter()
        .find(|c| c.get("type").and_then(Value::as_str) == Some(condition_type))?
        .get("status")?
        .as_str()
}

/// String value at `status.<key>`; dots in `key` descend into nested objects
pub fn custom_status<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    key.split('.')
        .try_fold(obj.get("status")?, |value, part| value.get(part))?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{event_list_json, not_found_json, MockService};
    use crate::wait::condition::{Resource, State};
    use serde_json::json;

    const K6_PATH: &str = "/apis/k6.io/v1alpha1/namespaces/default/k6s/run1";

    fn k6_discovery() -> MockService {
        MockService::new().with_discovery(&[
            ("v1", "events", "Event", true),
            ("k6.io/v1alpha1", "k6s", "K6", true),
        ])
    }

    fn k6_json(status: Value) -> String {
        json!({
            "apiVersion": "k6.io/v1alpha1",
            "kind": "K6",
            "metadata": {"name": "run1", "namespace": "default"},
            "status": status
        })
        .to_string()
    }

    fn finished_condition() -> WaitCondition {
        WaitCondition::new(
            Resource::new("K6", "run1", "default"),
            State::status_condition("Finished", "True"),
        )
    }

    #[test]
    fn test_condition_status_lookup() {
        let obj = json!({"status": {"conditions": [
            {"type": "Ready", "status": "False"},
            {"type": "Finished", "status": "True"}
        ]}});
        assert_eq!(condition_status(&obj, "Finished"), Some("True"));
        assert_eq!(condition_status(&obj, "Ready"), Some("False"));
        assert_eq!(condition_status(&obj, "Missing"), None);
        assert_eq!(condition_status(&json!({"status": {}}), "Finished"), None);
    }

    #[test]
    fn test_custom_status_lookup() {
        let obj = json!({"status": {"stage": "finished", "runner": {"phase": "done"}, "count": 3}});
        assert_eq!(custom_status(&obj, "stage"), Some("finished"));
        assert_eq!(custom_status(&obj, "runner.phase"), Some("done"));
        assert_eq!(custom_status(&obj, "count"), None);
        assert_eq!(custom_status(&json!({}), "stage"), None);
    }

    #[test]
    fn test_events_match() {
        let events: Vec<Event> = serde_json::from_value(json!([
            {"metadata": {"name": "a"}, "involvedObject": {"kind": "Job", "name": "t1"}, "reason": "SuccessfulCreate"},
            {"metadata": {"name": "b"}, "involvedObject": {"kind": "Job", "name": "t2"}, "reason": "Completed"}
        ]))
        .unwrap();
        assert!(!events_match(&events, "Job", "t1", "Completed"));
        assert!(events_match(&events, "Job", "t2", "Completed"));
        assert!(!events_match(&[], "Job", "t2", "Completed"));
    }

    #[tokio::test]
    async fn test_status_condition_done_on_first_check() {
        let client = k6_discovery()
            .on_get(K6_PATH, 200, &k6_json(json!({"conditions": [{"type": "Finished", "status": "True"}]})))
            .into_client();

        let predicate = finished_condition().build(client).unwrap();
        assert!(predicate.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_status_condition_wrong_status() {
        let client = k6_discovery()
            .on_get(K6_PATH, 200, &k6_json(json!({"conditions": [{"type": "Finished", "status": "False"}]})))
            .into_client();

        let predicate = finished_condition().build(client).unwrap();
        assert!(!predicate.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_status_condition_missing_object_is_not_ready() {
        let client = k6_discovery()
            .on_get(K6_PATH, 404, &not_found_json("k6s", "run1"))
            .into_client();

        let predicate = finished_condition().build(client).unwrap();
        assert!(!predicate.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_status_without_conditions_is_not_ready() {
        let client = k6_discovery()
            .on_get(K6_PATH, 200, &k6_json(json!({"stage": "started"})))
            .into_client();

        let predicate = finished_condition().build(client).unwrap();
        assert!(!predicate.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_status_custom() {
        let client = k6_discovery()
            .on_get(K6_PATH, 200, &k6_json(json!({"stage": "started"})))
            .on_get(K6_PATH, 200, &k6_json(json!({"stage": "finished"})))
            .into_client();

        let condition = WaitCondition::new(
            Resource::new("K6", "run1", "default"),
            State::status_custom("stage", "finished"),
        );
        let predicate = condition.build(client).unwrap();
        assert!(!predicate.check().await.unwrap());
        assert!(predicate.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_fatal() {
        let client = k6_discovery().into_client();
        let condition = WaitCondition::new(
            Resource::new("Gizmo", "g", "default"),
            State::status_custom("stage", "finished"),
        );

        let err = condition.build(client).unwrap().check().await.unwrap_err();
        assert!(matches!(err, EnvironmentError::ResourceLookupError(_)));
    }

    #[tokio::test]
    async fn test_event_predicate() {
        let client = MockService::new()
            .on_get("/api/v1/namespaces/default/events", 200, &event_list_json(&[]))
            .on_get(
                "/api/v1/namespaces/default/events",
                200,
                &event_list_json(&[("Job", "t1", "SuccessfulCreate"), ("Job", "t1", "Completed")]),
            )
            .into_client();

        let condition = WaitCondition::new(Resource::new("Job", "t1", "default"), State::event("Completed"));
        let predicate = condition.build(client).unwrap();
        assert!(!predicate.check().await.unwrap());
        assert!(predicate.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_build_rejects_invalid() {
        let condition = WaitCondition::new(Resource::new("Job", "t1", "default"), State::default());
        let result = condition.build(MockService::new().into_client());
        assert!(matches!(result, Err(EnvironmentError::ValidationError(_))));
    }
}
