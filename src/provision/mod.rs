// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Virtual cluster provisioning through the `vcluster` CLI.

use crate::error::{EnvironmentError, Result};
use std::future::Future;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Creates and removes the isolated cluster behind an environment.
///
/// Creating a cluster named `name` must leave a kubeconfig context with the
/// same name behind. Both calls are expected to be safe to retry.
pub trait Provisioner: Send + Sync {
    fn create(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn delete(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Runs the `vcluster` binary against a given kubeconfig
#[derive(Debug, Clone)]
pub struct VclusterCli {
    binary: String,
    kubeconfig: PathBuf,
}

impl VclusterCli {
    pub fn new(binary: impl Into<String>, kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            kubeconfig: kubeconfig.into(),
        }
    }

    fn create_args(name: &str) -> Vec<String> {
        vec![
            "create".to_string(),
            name.to_string(),
            format!("--kube-config-context-name={}", name),
        ]
    }

    fn delete_args(name: &str) -> Vec<String> {
        vec!["delete".to_string(), name.to_string()]
    }

    async fn run(&self, args: &[String]) -> Result<()> {
        debug!("Running {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .env("KUBECONFIG", &self.kubeconfig)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                EnvironmentError::ProvisionError(format!("failed to run {}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnvironmentError::ProvisionError(format!(
                "{} {} failed ({}): {}",
                self.binary,
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Provisioner for VclusterCli {
    #[instrument(skip(self))]
    async fn create(&self, name: &str) -> Result<()> {
        info!("Creating virtual cluster {}", name);
        self.run(&Self::create_args(name)).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str) -> Result<()> {
        info!("Deleting virtual cluster {}", name);
        self.run(&Self::delete_args(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_names_context_after_cluster() {
        assert_eq!(
            VclusterCli::create_args("perf"),
            vec!["create", "perf", "--kube-config-context-name=perf"]
        );
        assert_eq!(VclusterCli::delete_args("perf"), vec!["delete", "perf"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_provision_error() {
        let cli = VclusterCli::new("/nonexistent/vcluster", "/tmp/kubeconfig");
        let err = cli.create("perf").await.unwrap_err();
        assert!(matches!(err, EnvironmentError::ProvisionError(_)));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_provision_error() {
        let cli = VclusterCli::new("false", "/tmp/kubeconfig");
        let err = cli.delete("perf").await.unwrap_err();
        assert!(matches!(err, EnvironmentError::ProvisionError(_)));
    }
}
