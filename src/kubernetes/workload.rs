// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The k6 workloads started by a test run and the conditions that tell
//! when they are done.

use crate::constants::{k6, DEFAULT_NAMESPACE, FIELD_MANAGER};
use crate::error::{EnvironmentError, Result};
use crate::kubernetes::apply::{apply_spec, single_document, ManifestIdentity};
use crate::types::{ExecutionMode, TestDefinition};
use crate::wait::{Resource, State, WaitCondition};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument};

/// Terminal state a test run is awaited for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TestOutcome {
    #[default]
    Finished,
    Error,
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Finished => write!(f, "finished"),
            TestOutcome::Error => write!(f, "error"),
        }
    }
}

impl FromStr for TestOutcome {
    type Err = EnvironmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "finished" => Ok(TestOutcome::Finished),
            "error" => Ok(TestOutcome::Error),
            other => Err(EnvironmentError::ConfigurationError(format!(
                "unknown test criteria '{}', expected finished or error",
                other
            ))),
        }
    }
}

/// ConfigMap carrying the script, keyed by its file name
pub fn script_configmap(td: &TestDefinition, script: String) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(k6::SCRIPT_VOLUME.to_string()),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(td.location.clone(), script)])),
        ..Default::default()
    }
}

/// Job running the script once from the mounted script volume
pub fn standalone_job(name: &str, td: &TestDefinition) -> Job {
    Job {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    containers: vec![Container {
                        name: k6::CONTAINER_NAME.to_string(),
                        image: Some(td.image()),
                        command: Some(vec!["sh".to_string(), "-c".to_string(), td.cmd()]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: k6::SCRIPT_VOLUME.to_string(),
                            mount_path: k6::SCRIPT_MOUNT_PATH.to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: k6::SCRIPT_VOLUME.to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: k6::SCRIPT_VOLUME.to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Start the test: the script ConfigMap and Job in standalone mode, the
/// custom resource in operator mode.
#[instrument(skip(client, td), fields(mode = %td.mode))]
pub async fn submit_test(client: &Client, name: &str, td: &TestDefinition) -> Result<()> {
    let content = td.read()?;
    let pp = PatchParams::apply(FIELD_MANAGER).force();

    match td.mode {
        ExecutionMode::Operator => {
            apply_spec(client, &content).await?;
        }
        ExecutionMode::Standalone => {
            let configmaps: Api<ConfigMap> = Api::namespaced(client.clone(), DEFAULT_NAMESPACE);
            configmaps
                .patch(k6::SCRIPT_VOLUME, &pp, &Patch::Apply(&script_configmap(td, content)))
                .await?;

            let jobs: Api<Job> = Api::namespaced(client.clone(), DEFAULT_NAMESPACE);
            jobs.patch(name, &pp, &Patch::Apply(&standalone_job(name, td)))
                .await?;
        }
    }

    info!("Started test {} ({})", name, td.location);
    Ok(())
}

/// Condition reached once the test run ends in `outcome`.
///
/// A Job reports through its `Complete`/`Failed` conditions, the operator's
/// custom resource through `status.stage`.
pub fn completion_condition(name: &str, td: &TestDefinition, outcome: TestOutcome) -> Result<WaitCondition> {
    match td.mode {
        ExecutionMode::Standalone => {
            let condition_type = match outcome {
                TestOutcome::Finished => "Complete",
                TestOutcome::Error => "Failed",
            };
            Ok(WaitCondition::new(
                Resource::new("Job", name, DEFAULT_NAMESPACE),
                State::status_condition(condition_type, "True"),
            ))
        }
        ExecutionMode::Operator => {
            let identity = ManifestIdentity::from_value(&single_document(&td.read()?)?)?;
            Ok(WaitCondition::new(
                Resource::new(
                    identity.kind,
                    identity.name,
                    identity.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE),
                ),
                State::status_custom("stage", outcome.to_string()),
            ))
        }
    }
}
