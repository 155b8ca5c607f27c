// src/graph/mod.rs
//! Import graph access and per-flag-set resolution
//!
//! The host bundler owns module resolution and parsing. This module defines
//! the narrow interface the build needs from it ([`ModuleHost`]) and the
//! graph walks built on top of it.

pub mod bindings;
pub mod orchestrator;
pub mod virtual_matches;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use bindings::{BindingSet, accumulate_bindings};
pub use orchestrator::{EntryResolution, FlagSetResolution, GraphWalker};

/// A resolved import target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModule {
    pub id: String,
    /// External modules are never scanned
    #[serde(default)]
    pub external: bool,
}

impl ResolvedModule {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: false,
        }
    }

    pub fn external(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: true,
        }
    }
}

/// One binding imported by an import statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "name")]
pub enum ImportSpecifier {
    /// `import x from "..."`
    Default,
    /// `import { x } from "..."` (the exported name, not the local alias)
    Named(String),
    /// `import * as x from "..."`
    Namespace,
}

/// An import statement of a module: its raw source and what it binds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatement {
    pub source: String,
    #[serde(default)]
    pub specifiers: Vec<ImportSpecifier>,
}

/// Export metadata of a loaded module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    /// Every exported name, `default` included
    pub names: Vec<String>,
    pub has_default: bool,
}

impl ExportInfo {
    pub fn named_count(&self) -> usize {
        self.names.iter().filter(|n| n.as_str() != "default").count()
    }
}

/// What the host knows about a loaded module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedModule {
    #[serde(default)]
    pub imports: Vec<ImportStatement>,
    /// `None` when the host cannot tell (treated as a namespace)
    #[serde(default)]
    pub exports: Option<ExportInfo>,
    /// Modules whose adaptivity this module's content depends on
    #[serde(default)]
    pub scan_ids: Option<Vec<String>>,
    /// Original source, required alongside `scan_ids`
    #[serde(default)]
    pub source_code: Option<String>,
}

/// The host bundler, as seen from the build
#[async_trait]
pub trait ModuleHost: Send + Sync {
    /// Resolve an import specifier; `Ok(None)` when nothing handles it
    async fn resolve(&self, source: &str, importer: Option<&str>) -> Result<Option<ResolvedModule>>;

    /// Load and parse a module; `Ok(None)` when the id is unknown
    async fn load(&self, id: &str) -> Result<Option<LoadedModule>>;
}
