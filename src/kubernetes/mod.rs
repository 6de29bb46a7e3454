// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities: context isolation, client creation, type discovery,
//! server-side apply and the test workloads.

pub mod apply;
pub mod client;
pub mod context;
pub mod discovery;
pub mod workload;

pub use apply::{apply_document, apply_spec, split_documents};
pub use client::client_for_context;
pub use context::{ContextGuard, ContextStore, KubeconfigFile};
pub use discovery::{discover_kind, parse_api_version};
