// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Field owner used for every server-side apply issued by this crate
pub const FIELD_MANAGER: &str = "xk6-environment";

/// Namespace given to namespaced objects that do not declare one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Wait-condition polling defaults
pub mod wait {
    use std::time::Duration;

    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);
}

/// Standalone k6 workload layout
pub mod k6 {
    pub const DEFAULT_VERSION: &str = "0.45.1";
    pub const DEFAULT_COMMAND: &str = "run";
    pub const IMAGE: &str = "grafana/k6";
    pub const CONTAINER_NAME: &str = "k6";
    /// ConfigMap and volume holding the test script
    pub const SCRIPT_VOLUME: &str = "script-volume";
    pub const SCRIPT_MOUNT_PATH: &str = "/test";
}

/// Names of files with a special meaning inside an init folder
pub mod files {
    pub const KUSTOMIZATION: [&str; 3] = ["kustomization.yaml", "kustomization.yml", "Kustomization"];
    /// Custom resource that runs the test in operator mode
    pub const OPERATOR_TEST: [&str; 2] = ["test.yaml", "test.yml"];
}
