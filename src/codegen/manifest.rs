// src/codegen/manifest.rs
//! Per-entry asset manifests
//!
//! Every flag-set artifact of an entry yields a [`DocManifest`]: the HTML
//! fragments to place in the document head and body. The manifest table maps
//! each entry to its flagged manifests and is emitted as a dispatch function
//! (`__ARC_ASSETS__`) appended to the server bundle. A Rust-side
//! [`AssetManifest::lookup`] has the same semantics.

use super::{js_string, switch_expression};
use crate::error::Result;
use crate::flags::FlagSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Name of the generated dispatch function
pub const ASSETS_FUNCTION: &str = "__ARC_ASSETS__";

/// Name of the runtime flag source function
pub const FLAGS_FUNCTION: &str = "__ARC_FLAGS__";

/// Payload returned for an entry the manifest does not know
pub const UNKNOWN_ENTRY_HTML: &str = "<script>console.error('Unable to load adaptive arc files, \
    unknown entry was provided when asking for assets.')</script>";

/// Placeholder substituted when a manifest is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum InjectMarker {
    /// Extra attributes for asset tags (nonce, crossorigin, ...)
    AssetAttrs,
    /// Public base path for asset URLs
    PublicPath,
}

impl TryFrom<u8> for InjectMarker {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(InjectMarker::AssetAttrs),
            1 => Ok(InjectMarker::PublicPath),
            other => Err(format!("unknown manifest inject marker {}", other)),
        }
    }
}

impl From<InjectMarker> for u8 {
    fn from(marker: InjectMarker) -> Self {
        match marker {
            InjectMarker::AssetAttrs => 0,
            InjectMarker::PublicPath => 1,
        }
    }
}

/// One piece of a serialized HTML fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestPart {
    Html(String),
    Inject(InjectMarker),
}

/// HTML fragments for one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocManifest {
    #[serde(rename = "head-prepend", default, skip_serializing_if = "Option::is_none")]
    pub head_prepend: Option<Vec<ManifestPart>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Vec<ManifestPart>>,
    #[serde(rename = "body-prepend", default, skip_serializing_if = "Option::is_none")]
    pub body_prepend: Option<Vec<ManifestPart>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<ManifestPart>>,
}

/// A manifest with every placeholder substituted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedAssets {
    #[serde(rename = "head-prepend", skip_serializing_if = "Option::is_none")]
    pub head_prepend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    #[serde(rename = "body-prepend", skip_serializing_if = "Option::is_none")]
    pub body_prepend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl DocManifest {
    /// Manifest returned for unknown entries
    pub fn unknown_entry() -> Self {
        Self {
            head: Some(vec![ManifestPart::Html(UNKNOWN_ENTRY_HTML.to_string())]),
            ..Default::default()
        }
    }

    /// Join the parts of every fragment
    pub fn render(&self, base: &str, inject_attrs: &str) -> RenderedAssets {
        let join = |parts: &Option<Vec<ManifestPart>>| {
            parts.as_ref().map(|parts| {
                let mut html = String::new();
                for part in parts {
                    match part {
                        ManifestPart::Html(s) => html.push_str(s),
                        ManifestPart::Inject(InjectMarker::AssetAttrs) => {
                            html.push_str(inject_attrs)
                        }
                        ManifestPart::Inject(InjectMarker::PublicPath) => html.push_str(base),
                    }
                }
                html
            })
        };

        RenderedAssets {
            head_prepend: join(&self.head_prepend),
            head: join(&self.head),
            body_prepend: join(&self.body_prepend),
            body: join(&self.body),
        }
    }
}

/// The manifest of one flag-set artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedManifest {
    pub flags: FlagSet,
    pub manifest: DocManifest,
}

/// Manifests of every entry, most specific flag set first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    entries: BTreeMap<String, Vec<FlaggedManifest>>,
}

impl AssetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: impl Into<String>, flagged: FlaggedManifest) {
        let manifests = self.entries.entry(entry.into()).or_default();
        manifests.retain(|existing| existing.flags != flagged.flags);
        manifests.push(flagged);
        manifests.sort_by(|a, b| a.flags.cmp(&b.flags));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[FlaggedManifest])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Manifest for an entry under the active flags
    ///
    /// The least specific manifest is the fallback; unknown entries get a
    /// diagnostic manifest. Never fails.
    pub fn lookup(&self, entry: &str, active: Option<&FlagSet>) -> DocManifest {
        let manifests = self.entries.get(entry);
        let Some((fallback, specific)) = manifests.and_then(|m| m.split_last()) else {
            debug!("No assets for unknown entry {}", entry);
            return DocManifest::unknown_entry();
        };

        let empty = FlagSet::empty();
        let active = active.unwrap_or(&empty);
        specific
            .iter()
            .find(|flagged| active.satisfies(&flagged.flags))
            .unwrap_or(fallback)
            .manifest
            .clone()
    }

    /// Generate the `__ARC_ASSETS__` dispatch function
    pub fn to_code(&self) -> Result<String> {
        let mut code = format!(
            ";function {}(entry) {{const f = {}() || {{}};switch(entry) {{",
            ASSETS_FUNCTION, FLAGS_FUNCTION
        );

        for (entry, manifests) in &self.entries {
            let Some((fallback, specific)) = manifests.split_last() else {
                continue;
            };

            let mut branches = Vec::with_capacity(specific.len());
            for flagged in specific {
                branches.push((&flagged.flags, serde_json::to_string(&flagged.manifest)?));
            }
            let default = serde_json::to_string(&fallback.manifest)?;

            code.push_str(&format!(
                "case {}:return {}",
                js_string(entry),
                switch_expression(branches, default)
            ));
        }

        let unknown = serde_json::to_string(&DocManifest::unknown_entry())?;
        code.push_str(&format!("}}return {}}};\n", unknown));
        Ok(code)
    }
}
