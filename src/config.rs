// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::constants::k6;

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Kubeconfig holding the parent context and every environment context
    pub kubeconfig: PathBuf,
    /// Virtual cluster CLI used to create and delete environments
    pub vcluster_bin: String,
    /// k6 image tag used for standalone tests that do not pin one
    pub k6_version: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let kubeconfig = match env::var("KUBECONFIG") {
            Ok(paths) => kubeconfig_from_list(&paths)
                .context("KUBECONFIG environment variable is set but empty")?,
            Err(_) => default_kubeconfig().context("KUBECONFIG is not set and no home directory was found")?,
        };
        let vcluster_bin = env::var("VCLUSTER_BIN").unwrap_or_else(|_| "vcluster".to_string());
        let k6_version = env::var("K6_VERSION").unwrap_or_else(|_| k6::DEFAULT_VERSION.to_string());

        Ok(Config {
            kubeconfig,
            vcluster_bin,
            k6_version,
        })
    }
}

fn default_kubeconfig() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("config"))
}

// Only the first file of a KUBECONFIG list is modified.
fn kubeconfig_from_list(paths: &str) -> Option<PathBuf> {
    env::split_paths(paths).find(|p| !p.as_os_str().is_empty())
}
