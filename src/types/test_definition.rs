// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{files, k6};
use crate::error::{EnvironmentError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// How a test is executed inside the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// A plain k6 script run by a batch Job
    Standalone,
    /// A custom resource reconciled by the k6 operator
    Operator,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Standalone => write!(f, "standalone"),
            ExecutionMode::Operator => write!(f, "operator"),
        }
    }
}

/// Runtime options of a k6 invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct K6Options {
    pub version: String,
    pub command: String,
    pub arguments: String,
}

impl Default for K6Options {
    fn default() -> Self {
        Self {
            version: k6::DEFAULT_VERSION.to_string(),
            command: k6::DEFAULT_COMMAND.to_string(),
            arguments: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDefinition {
    /// Entrypoint file name, relative to `folder`
    pub location: String,
    pub folder: PathBuf,
    pub mode: ExecutionMode,
    pub options: K6Options,
}

impl TestDefinition {
    pub fn new(folder: impl Into<PathBuf>, location: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            location: location.into(),
            folder: folder.into(),
            mode,
            options: K6Options::default(),
        }
    }

    pub fn with_options(mut self, options: K6Options) -> Self {
        self.options = options;
        self
    }

    /// Locate the test in `folder`: a `*.js` script runs standalone, a
    /// `test.yaml` custom resource runs through the operator.
    pub fn discover(folder: &Path) -> Result<Option<Self>> {
        let mut names: Vec<String> = std::fs::read_dir(folder)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        if let Some(script) = names.iter().find(|n| n.ends_with(".js")) {
            return Ok(Some(Self::new(folder, script.clone(), ExecutionMode::Standalone)));
        }
        if let Some(cr) = names.iter().find(|n| files::OPERATOR_TEST.contains(&n.as_str())) {
            return Ok(Some(Self::new(folder, cr.clone(), ExecutionMode::Operator)));
        }
        Ok(None)
    }

    /// Read the entrypoint's content
    pub fn read(&self) -> Result<String> {
        let path = self.folder.join(&self.location);
        std::fs::read_to_string(&path).map_err(|e| {
            EnvironmentError::ConfigurationError(format!(
                "Failed to read test {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Shell command running the script from the mounted script volume
    pub fn cmd(&self) -> String {
        let cmd = format!(
            "k6 {} {}/{} {}",
            self.options.command,
            k6::SCRIPT_MOUNT_PATH,
            self.location,
            self.options.arguments
        );
        cmd.trim_end().to_string()
    }

    pub fn image(&self) -> String {
        format!("{}:{}", k6::IMAGE, self.options.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_without_arguments() {
        let td = TestDefinition::new("/tmp", "test.js", ExecutionMode::Standalone);
        assert_eq!(td.cmd(), "k6 run /test/test.js");
        assert_eq!(td.image(), "grafana/k6:0.45.1");
    }

    #[test]
    fn test_cmd_with_options() {
        let td = TestDefinition::new("/tmp", "load.js", ExecutionMode::Standalone).with_options(
            K6Options {
                version: "0.50.0".to_string(),
                command: "run".to_string(),
                arguments: "--vus 10 --duration 30s".to_string(),
            },
        );
        assert_eq!(td.cmd(), "k6 run /test/load.js --vus 10 --duration 30s");
        assert_eq!(td.image(), "grafana/k6:0.50.0");
    }

    #[test]
    fn test_discover_prefers_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.yaml"), "kind: TestRun").unwrap();
        std::fs::write(dir.path().join("test.js"), "export default function () {}").unwrap();

        let td = TestDefinition::discover(dir.path()).unwrap().unwrap();
        assert_eq!(td.mode, ExecutionMode::Standalone);
        assert_eq!(td.location, "test.js");
        assert!(td.read().unwrap().contains("export default"));
    }

    #[test]
    fn test_discover_operator_test() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deployment.yaml"), "kind: Deployment").unwrap();
        std::fs::write(dir.path().join("test.yaml"), "kind: TestRun").unwrap();

        let td = TestDefinition::discover(dir.path()).unwrap().unwrap();
        assert_eq!(td.mode, ExecutionMode::Operator);
        assert_eq!(td.location, "test.yaml");
    }

    #[test]
    fn test_discover_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deployment.yaml"), "kind: Deployment").unwrap();
        assert_eq!(TestDefinition::discover(dir.path()).unwrap(), None);
    }
}
