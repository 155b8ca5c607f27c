// src/bundle.rs

//! Bundle output phase
//!
//! The server build runs first and records which of its output files are
//! server entries. The web build then reads that record back, builds the
//! asset manifest from its flag-set artifacts and appends the dispatch
//! function to every server entry.

use crate::codegen::manifest::{AssetManifest, DocManifest, FlaggedManifest};
use crate::codegen::runtime::SERVER_RUNTIME;
use crate::error::{Error, Result};
use crate::module_ref::{SERVER_RUNTIME_SHIM_ID, parse_artifact_name};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// A chunk emitted by the host bundler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputChunk {
    pub file_name: String,
    pub is_entry: bool,
    /// Bare imports left in the chunk
    pub imports: Vec<String>,
    /// Ids of the modules bundled into the chunk
    pub module_ids: Vec<String>,
}

impl OutputChunk {
    fn is_server_entry(&self) -> bool {
        self.is_entry
            && (self.imports.iter().any(|i| i == SERVER_RUNTIME)
                || self.module_ids.iter().any(|id| id == SERVER_RUNTIME_SHIM_ID))
    }
}

/// An HTML asset emitted for one entry artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputAsset {
    pub file_name: String,
    pub manifest: DocManifest,
}

/// Absolute paths of the server entry chunks of a server build
pub fn collect_server_entries(
    chunks: &[OutputChunk],
    out_dir: &Path,
    is_write: bool,
) -> Result<Vec<PathBuf>> {
    if !is_write {
        return Err(Error::BuildContract(
            "the server build must write its output to disk".to_string(),
        ));
    }

    let entries: Vec<PathBuf> = chunks
        .iter()
        .filter(|chunk| chunk.is_server_entry())
        .map(|chunk| out_dir.join(&chunk.file_name))
        .collect();

    if entries.is_empty() {
        return Err(Error::BuildContract(
            "the server code did not import 'arc-server'".to_string(),
        ));
    }

    debug!("Found {} server entry file(s)", entries.len());
    Ok(entries)
}

/// Record handed from the server build to the web build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntries {
    pub server_entry_files: Vec<PathBuf>,
}

/// Read-once store for [`ServerEntries`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntryStore {
    path: PathBuf,
}

impl ServerEntryStore {
    /// Store in the temp directory, keyed by runtime id
    pub fn new(runtime_id: &str) -> Self {
        Self::at(std::env::temp_dir().join(format!("adaptive-{}.json", runtime_id)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the entries, replacing any previous record
    pub async fn write(&self, entries: &ServerEntries) -> Result<()> {
        let json = serde_json::to_vec(entries)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a temp file, then rename into place
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Take the entries; the record is removed once read
    pub async fn read(&self) -> Result<ServerEntries> {
        let content = tokio::fs::read(&self.path).await.map_err(|e| {
            Error::StoreError(format!(
                "unable to read server entries from {} (was the server build run first?): {}",
                self.path.display(),
                e
            ))
        })?;

        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!("Failed to remove {}: {}", self.path.display(), e);
        }

        serde_json::from_slice(&content)
            .map_err(|e| Error::StoreError(format!("corrupt server entry record: {}", e)))
    }
}

/// Build the asset manifest from the flag-set artifacts of a web build
pub fn build_manifest(assets: &[OutputAsset]) -> AssetManifest {
    let mut manifest = AssetManifest::new();
    for asset in assets {
        let Some((entry, flags)) = parse_artifact_name(&asset.file_name) else {
            continue;
        };
        manifest.insert(
            entry,
            FlaggedManifest {
                flags,
                manifest: asset.manifest.clone(),
            },
        );
    }
    manifest
}

/// Finish a web build: append the manifest dispatch to the server entries
pub async fn finalize_web_bundle(
    assets: &[OutputAsset],
    is_write: bool,
    store: &ServerEntryStore,
) -> Result<AssetManifest> {
    if !is_write {
        return Err(Error::BuildContract(
            "the web build must write its output to disk".to_string(),
        ));
    }

    let entries = store.read().await?;
    let manifest = build_manifest(assets);
    let code = manifest.to_code()?;

    try_join_all(
        entries
            .server_entry_files
            .iter()
            .map(|file| append_code(file, &code)),
    )
    .await?;

    info!(
        "Appended manifest of {} entr(y/ies) to {} server file(s)",
        manifest.len(),
        entries.server_entry_files.len()
    );
    Ok(manifest)
}

async fn append_code(file: &Path, code: &str) -> Result<()> {
    let mut handle = tokio::fs::OpenOptions::new()
        .append(true)
        .open(file)
        .await?;
    handle.write_all(code.as_bytes()).await?;
    handle.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::manifest::ManifestPart;
    use crate::flags::FlagSet;

    fn chunk(
        file_name: &str,
        is_entry: bool,
        imports: &[&str],
        module_ids: &[&str],
    ) -> OutputChunk {
        OutputChunk {
            file_name: file_name.to_string(),
            is_entry,
            imports: imports.iter().map(|s| s.to_string()).collect(),
            module_ids: module_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn asset(file_name: &str, body: &str) -> OutputAsset {
        OutputAsset {
            file_name: file_name.to_string(),
            manifest: DocManifest {
                body: Some(vec![ManifestPart::Html(body.to_string())]),
                ..Default::default()
            },
        }
    }

    // === Server entry tests ===

    #[test]
    fn test_collect_server_entries() {
        let chunks = vec![
            chunk("index.js", true, &["arc-server"], &[]),
            chunk("bundled.js", true, &[], &[SERVER_RUNTIME_SHIM_ID]),
            chunk("other.js", true, &["react"], &["/src/other.js"]),
            chunk("shared.js", false, &["arc-server"], &[]),
        ];
        let entries = collect_server_entries(&chunks, Path::new("/out"), true).unwrap();
        assert_eq!(
            entries,
            vec![PathBuf::from("/out/index.js"), PathBuf::from("/out/bundled.js")]
        );
    }

    #[test]
    fn test_collect_server_entries_contract() {
        let chunks = vec![chunk("index.js", true, &["arc-server"], &[])];
        assert!(matches!(
            collect_server_entries(&chunks, Path::new("/out"), false),
            Err(Error::BuildContract(_))
        ));

        let err = collect_server_entries(&[chunk("a.js", true, &[], &[])], Path::new("/out"), true)
            .unwrap_err();
        assert!(err.to_string().contains("did not import 'arc-server'"));
    }

    // === Store tests ===

    #[tokio::test]
    async fn test_store_is_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ServerEntryStore::at(dir.path().join("entries.json"));
        let entries = ServerEntries {
            server_entry_files: vec![PathBuf::from("/out/index.js")],
        };

        store.write(&entries).await.unwrap();
        assert_eq!(store.read().await.unwrap(), entries);
        assert!(!store.path().exists());
        assert!(matches!(store.read().await, Err(Error::StoreError(_))));
    }

    #[test]
    fn test_store_default_location() {
        let store = ServerEntryStore::new("arc_shop");
        assert_eq!(store.path(), std::env::temp_dir().join("adaptive-arc_shop.json"));
    }

    // === Finalize tests ===

    #[test]
    fn test_build_manifest_ignores_other_assets() {
        let manifest = build_manifest(&[
            asset("index.arc.html", "default"),
            asset("index.arc.mobile.html", "mobile"),
            asset("favicon.html", "ignored"),
        ]);
        assert_eq!(manifest.len(), 1);

        let mobile = FlagSet::normalize(["mobile"]);
        assert_eq!(
            manifest.lookup("index", Some(&mobile)).body,
            Some(vec![ManifestPart::Html("mobile".into())])
        );
    }

    #[tokio::test]
    async fn test_finalize_appends_to_server_entries() {
        let dir = tempfile::tempdir().unwrap();
        let server_file = dir.path().join("index.js");
        std::fs::write(&server_file, "export default 1;").unwrap();

        let store = ServerEntryStore::at(dir.path().join("entries.json"));
        store
            .write(&ServerEntries {
                server_entry_files: vec![server_file.clone()],
            })
            .await
            .unwrap();

        let manifest = finalize_web_bundle(
            &[asset("index.arc.html", "a"), asset("index.arc.mobile.html", "b")],
            true,
            &store,
        )
        .await
        .unwrap();

        let written = std::fs::read_to_string(&server_file).unwrap();
        assert!(written.starts_with("export default 1;;function __ARC_ASSETS__(entry)"));
        assert_eq!(written, format!("export default 1;{}", manifest.to_code().unwrap()));
    }

    #[tokio::test]
    async fn test_finalize_without_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ServerEntryStore::at(dir.path().join("missing.json"));
        assert!(matches!(
            finalize_web_bundle(&[], true, &store).await,
            Err(Error::StoreError(_))
        ));
        assert!(matches!(
            finalize_web_bundle(&[], false, &store).await,
            Err(Error::BuildContract(_))
        ));
    }
}
