// src/graph/orchestrator.rs

//! Per-flag-set import graph resolution
//!
//! For one entry module and every declared flag set:
//! - scan the graph reachable from the entry once, deferring adaptive imports
//! - per flag set, resolve each pending adaptive import to its selected
//!   variant and keep scanning from there (variants may import further
//!   adaptive modules), until nothing is pending
//!
//! Module scans (import edges) are memoized for the whole build pass; each
//! flag-set pass only owns its visited sets and its pending queue.

use super::bindings::{BindingSet, accumulate_bindings};
use super::{ModuleHost, ResolvedModule};
use crate::error::{Error, Result};
use crate::flags::FlagSet;
use crate::matcher::{Matcher, Matches, Selection};
use crate::module_ref::{AdaptiveImportId, ModuleRegistry};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::try_join_all;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Import edges of one scanned module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedModule {
    /// Non-adaptive, non-external imports
    pub imports: Vec<String>,
    /// Adaptive imports, resolved later per flag set
    pub adaptive: Vec<AdaptiveImportId>,
}

/// Graph state shared by every walk of one build pass
#[derive(Debug, Default)]
pub struct GraphState {
    scans: DashMap<String, Arc<ScannedModule>>,
    matches: DashMap<AdaptiveImportId, Arc<Matches>>,
    bindings: DashMap<AdaptiveImportId, BindingSet>,
    virtual_sources: DashMap<AdaptiveImportId, String>,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches recorded for an adaptive module
    pub fn matches(&self, aid: AdaptiveImportId) -> Option<Arc<Matches>> {
        self.matches.get(&aid).map(|m| m.clone())
    }

    pub fn record_matches(&self, aid: AdaptiveImportId, matches: Arc<Matches>) {
        self.matches.insert(aid, matches);
    }

    /// Bindings importers read from an adaptive module, if any
    pub fn bindings(&self, aid: AdaptiveImportId) -> Option<BindingSet> {
        self.bindings.get(&aid).map(|b| b.clone())
    }

    /// Source code kept for the virtual matches of a scan-id module
    pub fn virtual_source(&self, aid: AdaptiveImportId) -> Option<String> {
        self.virtual_sources.get(&aid).map(|s| s.clone())
    }

    pub(crate) fn record_virtual_source(&self, aid: AdaptiveImportId, code: String) {
        self.virtual_sources.insert(aid, code);
    }

    pub fn scanned(&self) -> usize {
        self.scans.len()
    }

    pub fn clear(&self) {
        self.scans.clear();
        self.matches.clear();
        self.bindings.clear();
        self.virtual_sources.clear();
    }
}

/// Resolution of one entry under one flag set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSetResolution {
    pub flags: FlagSet,
    /// Adaptive import -> chosen concrete variant, in discovery order
    pub resolved: Vec<(AdaptiveImportId, String)>,
    /// Every concrete module reachable under this flag set
    pub modules: BTreeSet<String>,
}

impl FlagSetResolution {
    pub fn concrete_for(&self, aid: AdaptiveImportId) -> Option<&str> {
        self.resolved
            .iter()
            .find(|(id, _)| *id == aid)
            .map(|(_, concrete)| concrete.as_str())
    }

    pub fn has_adaptive_imports(&self) -> bool {
        !self.resolved.is_empty()
    }
}

/// Resolution of one entry under every flag set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryResolution {
    pub entry: String,
    pub passes: Vec<FlagSetResolution>,
}

impl EntryResolution {
    pub fn for_flags(&self, flags: &FlagSet) -> Option<&FlagSetResolution> {
        self.passes.iter().find(|pass| &pass.flags == flags)
    }
}

/// Visited sets owned by one flag-set pass
#[derive(Debug, Clone, Default)]
struct PassState {
    seen: HashSet<String>,
    seen_adaptive: HashSet<AdaptiveImportId>,
    pending: Vec<AdaptiveImportId>,
}

/// Walks import graphs through a host for one build pass
pub struct GraphWalker<'a> {
    pub(crate) host: &'a dyn ModuleHost,
    pub(crate) matcher: &'a Matcher,
    pub(crate) registry: &'a ModuleRegistry,
    pub(crate) state: &'a GraphState,
}

impl<'a> GraphWalker<'a> {
    pub fn new(
        host: &'a dyn ModuleHost,
        matcher: &'a Matcher,
        registry: &'a ModuleRegistry,
        state: &'a GraphState,
    ) -> Self {
        Self {
            host,
            matcher,
            registry,
            state,
        }
    }

    /// Adaptive id of a module, registering its matches on first sight
    pub fn classify(&self, id: &str) -> Result<Option<AdaptiveImportId>> {
        let Some(matches) = self.matcher.get_matches(id)? else {
            return Ok(None);
        };
        let aid = self.registry.adaptive_id(id);
        self.state.matches.entry(aid).or_insert(matches);
        Ok(Some(aid))
    }

    /// Import edges of a module, memoized for the build pass
    ///
    /// Bindings of adaptive imports are accumulated here, once per scan.
    pub async fn scan_module(&self, id: &str) -> Result<Arc<ScannedModule>> {
        if let Some(scan) = self.state.scans.get(id) {
            return Ok(scan.clone());
        }

        let Some(loaded) = self.host.load(id).await? else {
            debug!("Host has no module {}", id);
            let empty = Arc::new(ScannedModule::default());
            self.state.scans.insert(id.to_string(), empty.clone());
            return Ok(empty);
        };

        let resolutions = try_join_all(
            loaded
                .imports
                .iter()
                .map(|statement| self.host.resolve(&statement.source, Some(id))),
        )
        .await?;

        let mut scan = ScannedModule::default();
        for (statement, resolved) in loaded.imports.iter().zip(resolutions) {
            let Some(ResolvedModule { id: child, external }) = resolved else {
                continue;
            };
            if external {
                continue;
            }

            match self.classify(&child)? {
                Some(aid) => {
                    match self.state.bindings.entry(aid) {
                        Entry::Occupied(mut slot) => {
                            let current = Some(slot.get().clone());
                            if let Some(bindings) = accumulate_bindings(current, statement) {
                                slot.insert(bindings);
                            }
                        }
                        Entry::Vacant(slot) => {
                            if let Some(bindings) = accumulate_bindings(None, statement) {
                                slot.insert(bindings);
                            }
                        }
                    }
                    if !scan.adaptive.contains(&aid) {
                        scan.adaptive.push(aid);
                    }
                }
                None => {
                    if !scan.imports.contains(&child) {
                        scan.imports.push(child);
                    }
                }
            }
        }

        let scan = Arc::new(scan);
        self.state.scans.insert(id.to_string(), scan.clone());
        Ok(scan)
    }

    /// Scan outwards from `start`, one concurrent level at a time
    async fn reach(&self, start: Vec<String>, pass: &mut PassState) -> Result<()> {
        let mut frontier: Vec<String> = start
            .into_iter()
            .filter(|id| pass.seen.insert(id.clone()))
            .collect();

        while !frontier.is_empty() {
            let scans = try_join_all(frontier.iter().map(|id| self.scan_module(id))).await?;

            let mut next = Vec::new();
            for scan in scans {
                for child in &scan.imports {
                    if pass.seen.insert(child.clone()) {
                        next.push(child.clone());
                    }
                }
                for aid in &scan.adaptive {
                    if pass.seen_adaptive.insert(*aid) {
                        pass.pending.push(*aid);
                    }
                }
            }
            frontier = next;
        }

        Ok(())
    }

    /// Variant an adaptive module resolves to under `flags`
    ///
    /// Follows chains of adaptive variants. Selecting a variant already on
    /// the chain is an error.
    pub fn select_variant(&self, aid: AdaptiveImportId, flags: &FlagSet) -> Result<String> {
        let path = self.registry.adaptive_path(aid).ok_or_else(|| {
            Error::HostError(format!("unknown adaptive import {}", aid))
        })?;
        let mut matches = self.state.matches(aid).ok_or_else(|| {
            Error::HostError(format!("no matches recorded for {}", path))
        })?;
        let mut chain = vec![path];

        loop {
            let next = match matches.select(flags) {
                Selection::Default(value) => return Ok(value.to_string()),
                Selection::Alternate(alternate) => alternate.value.clone(),
            };

            if chain.contains(&next) {
                chain.push(next);
                warn!("Adaptive cycle under {}: {}", flags, chain.join(" -> "));
                return Err(Error::AdaptiveCycle {
                    chain,
                    flags: flags.to_dotted(),
                });
            }

            match self.matcher.get_matches(&next)? {
                Some(next_matches) => {
                    chain.push(next);
                    matches = next_matches;
                }
                None => return Ok(next),
            }
        }
    }

    async fn resolve_flag_set(
        &self,
        flags: &FlagSet,
        mut pass: PassState,
    ) -> Result<FlagSetResolution> {
        let mut resolved = Vec::new();

        while !pass.pending.is_empty() {
            let batch = std::mem::take(&mut pass.pending);
            let mut start = Vec::with_capacity(batch.len());
            for aid in batch {
                let concrete = self.select_variant(aid, flags)?;
                resolved.push((aid, concrete.clone()));
                start.push(concrete);
            }
            self.reach(start, &mut pass).await?;
        }

        debug!(
            "Flag set {} resolves {} adaptive import(s) across {} module(s)",
            flags,
            resolved.len(),
            pass.seen.len()
        );

        Ok(FlagSetResolution {
            flags: flags.clone(),
            resolved,
            modules: pass.seen.into_iter().collect(),
        })
    }

    /// Resolve an entry module under every flag set
    ///
    /// The initial scan is shared; the flag-set passes run concurrently and
    /// the first failing pass fails the whole entry.
    pub async fn resolve_entry(
        &self,
        entry: &str,
        flag_sets: &[FlagSet],
    ) -> Result<EntryResolution> {
        let mut initial = PassState::default();
        self.reach(vec![entry.to_string()], &mut initial).await?;

        info!(
            "Resolving {} with {} pending adaptive import(s) across {} flag set(s)",
            entry,
            initial.pending.len(),
            flag_sets.len()
        );

        let passes = try_join_all(
            flag_sets
                .iter()
                .map(|flags| self.resolve_flag_set(flags, initial.clone())),
        )
        .await?;

        Ok(EntryResolution {
            entry: entry.to_string(),
            passes,
        })
    }
}
