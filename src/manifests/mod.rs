// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The manifests an environment is initialized with.

pub mod order;
pub mod overlay;

use crate::constants::files;
use crate::error::Result;
use crate::kubernetes::split_documents;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One manifest file as found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub path: PathBuf,
    pub content: String,
}

/// Manifest files in discovery order plus the overlay directory, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSet {
    pub documents: Vec<Manifest>,
    pub overlay: Option<PathBuf>,
}

impl ManifestSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.overlay.is_none()
    }

    /// Walk `folder` in lexical order collecting `*.yaml`/`*.yml` manifests.
    ///
    /// A kustomization file marks its directory as the overlay; the first one
    /// found wins. The operator test resource at the top of `folder` is the
    /// test, not part of the environment.
    pub fn discover(folder: &Path) -> Result<Self> {
        let mut set = Self::empty();
        set.walk(folder, true)?;
        debug!(
            "Found {} manifests in {} (overlay: {:?})",
            set.documents.len(),
            folder.display(),
            set.overlay
        );
        Ok(set)
    }

    fn walk(&mut self, dir: &Path, top: bool) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.walk(&path, false)?;
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if files::KUSTOMIZATION.contains(&name.as_str()) {
                if self.overlay.is_none() {
                    self.overlay = Some(dir.to_path_buf());
                }
                continue;
            }
            if top && files::OPERATOR_TEST.contains(&name.as_str()) {
                continue;
            }
            if matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")) {
                let content = std::fs::read_to_string(&path)?;
                self.documents.push(Manifest { path, content });
            }
        }
        Ok(())
    }

    /// Documents to apply, in order.
    ///
    /// With an overlay the rendered and dependency-ordered overlay is used;
    /// otherwise every document of every manifest in discovery order.
    pub fn resolve(&self) -> Result<Vec<Value>> {
        if let Some(dir) = &self.overlay {
            return overlay::render(dir);
        }

        let mut documents = Vec::new();
        for manifest in &self.documents {
            documents.extend(split_documents(&manifest.content)?);
        }
        Ok(documents)
    }
}
