// src/matcher/fs.rs
//! Filesystem naming convention for adaptive variants
//!
//! Variants of `/dir/name.ext` are siblings named `name[flags].ext`:
//! - `button[mobile].js` is active when `mobile` is set
//! - `button[mobile+ios].js` needs both `mobile` and `ios`
//! - `button[mobile,tablet].js` serves either audience (two candidates)
//!
//! A file whose name already contains `[` is a variant, never adaptive itself.
//!
//! [`AdaptiveFs`] is the filesystem as one flag set sees it: paths resolve to
//! their selected variant and directory listings leave variant files out.
//! Hosts compiling a virtual-match module read its dependencies through it.

use super::{Matcher, RawMatch, RawResolver};
use crate::error::{Error, Result};
use crate::flags::FlagSet;
use dashmap::DashMap;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Raw candidate resolver scanning sibling files on disk
#[derive(Debug, Default)]
pub struct DirectoryResolver {
    cache: DashMap<PathBuf, Option<Vec<RawMatch>>>,
}

impl DirectoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn scan(path: &Path) -> Result<Option<Vec<RawMatch>>> {
        let file_name = path.file_name().and_then(|n| n.to_str());
        let (Some(file_name), Some(dir)) = (file_name, path.parent()) else {
            return Ok(None);
        };

        if file_name.contains('[') {
            return Ok(None);
        }

        let (stem, ext) = split_extension(file_name);
        let prefix = format!("{}[", stem);
        let suffix = format!("]{}", ext);

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::ResolverError {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let mut variants: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::ResolverError {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.len() > prefix.len() + suffix.len()
                && name.starts_with(&prefix)
                && name.ends_with(&suffix)
            {
                variants.push((name, entry.path()));
            }
        }

        if variants.is_empty() {
            return Ok(None);
        }

        // Directory order is unspecified.
        variants.sort();

        let mut raw = Vec::new();
        for (name, variant_path) in variants {
            let Some(value) = variant_path.to_str() else {
                continue;
            };
            let inner = &name[prefix.len()..name.len() - suffix.len()];
            match parse_requirements(inner) {
                Some(requirements) => {
                    for flags in requirements {
                        raw.push(RawMatch {
                            flags,
                            value: value.to_string(),
                        });
                    }
                }
                None => warn!("Ignoring malformed variant file name {}", name),
            }
        }

        if raw.is_empty() {
            return Ok(None);
        }

        let Some(default) = path.to_str() else {
            return Ok(None);
        };
        raw.push(RawMatch {
            flags: Vec::new(),
            value: default.to_string(),
        });

        debug!("Found {} variant candidate(s) for {}", raw.len() - 1, default);
        Ok(Some(raw))
    }
}

impl DirectoryResolver {
    /// The variant of `path` an active flag set sees, or `path` itself
    ///
    /// Every on-disk candidate counts, declared or not. The satisfied
    /// candidate with the most flags wins; ties keep file name order.
    pub fn adapt_path(&self, path: &str, flags: &FlagSet) -> Result<String> {
        let Some(raw) = self.raw_matches(path)? else {
            return Ok(path.to_string());
        };
        let Some((default, alternates)) = raw.split_last() else {
            return Ok(path.to_string());
        };

        let mut chosen: Option<&RawMatch> = None;
        for alternate in alternates {
            if !crate::flags::satisfies(flags, &alternate.flags) {
                continue;
            }
            if chosen.is_none_or(|c| alternate.flags.len() > c.flags.len()) {
                chosen = Some(alternate);
            }
        }
        Ok(chosen.unwrap_or(default).value.clone())
    }

    /// Listing of `dir` as an active flag set sees it
    ///
    /// An adaptive directory lists its selected variant. Variant files are
    /// never listed.
    pub fn read_dir(&self, dir: &str, flags: &FlagSet) -> Result<Vec<PathBuf>> {
        let adapted = self.adapt_path(dir, flags)?;
        read_dir_without_variants(Path::new(&adapted))
    }
}

impl RawResolver for DirectoryResolver {
    fn raw_matches(&self, path: &str) -> Result<Option<Vec<RawMatch>>> {
        let path = Path::new(path);
        if let Some(cached) = self.cache.get(path) {
            return Ok(cached.clone());
        }

        let raw = Self::scan(path)?;
        self.cache.insert(path.to_path_buf(), raw.clone());
        Ok(raw)
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// The filesystem seen by one flag set
///
/// Selection goes through a [`Matcher`], so only declared flag sets pick
/// alternates, exactly as module resolution does.
pub struct AdaptiveFs<'a> {
    matcher: &'a Matcher,
    flags: FlagSet,
}

impl<'a> AdaptiveFs<'a> {
    pub fn new(matcher: &'a Matcher, flags: FlagSet) -> Self {
        Self { matcher, flags }
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    /// The variant selected for `path`, or `path` itself when not adaptive
    pub fn adapt_path(&self, path: &str) -> Result<String> {
        let adapted = match self.matcher.get_matches(path)? {
            Some(matches) => matches.pick(&self.flags).to_string(),
            None => path.to_string(),
        };
        if adapted != path {
            trace!("{} reads {} for [{}]", path, adapted, self.flags);
        }
        Ok(adapted)
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.adapt_path(path)?)?)
    }

    pub fn read_to_string(&self, path: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.adapt_path(path)?)?)
    }

    pub fn metadata(&self, path: &str) -> Result<Metadata> {
        Ok(std::fs::metadata(self.adapt_path(path)?)?)
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        Ok(Path::new(&self.adapt_path(path)?).exists())
    }

    /// Entries of the selected directory, variant files left out
    pub fn read_dir(&self, dir: &str) -> Result<Vec<PathBuf>> {
        read_dir_without_variants(Path::new(&self.adapt_path(dir)?))
    }
}

/// Sorted entries of `dir`, leaving out variant files (`name[flags].ext`)
pub fn read_dir_without_variants(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().contains('[') {
            continue;
        }
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// `"button.js"` -> `("button", ".js")`; names without a dot have no extension
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(0) | None => (file_name, ""),
        Some(i) => file_name.split_at(i),
    }
}

/// `"mobile+ios,tablet"` -> `[["mobile", "ios"], ["tablet"]]`
fn parse_requirements(inner: &str) -> Option<Vec<Vec<String>>> {
    let mut requirements = Vec::new();
    for alternative in inner.split(',') {
        let flags: Vec<String> = alternative
            .split('+')
            .map(|flag| flag.trim().to_string())
            .collect();
        if flags.iter().any(String::is_empty) {
            return None;
        }
        requirements.push(flags);
    }
    Some(requirements)
}
