// src/session.rs

//! Build session: the bodies of the host bundler hooks
//!
//! A session owns every piece of per-build mutable state: the matcher cache,
//! the id registry, memoized module scans, binding sets and the per-flag-set
//! resolutions of each entry. It is created at build start and cleared by
//! [`BuildSession::finish`] at build end.

use crate::codegen::proxy::{SERVER_PROXY_RUNTIME, css_proxy, init_module, server_proxy, web_proxy};
use crate::codegen::runtime::{
    SERVER_RUNTIME, chunk_banner, chunk_footer, entry_variant_module, server_runtime_module,
};
use crate::codegen::{ExportShape, GeneratedModule, SideEffects, index_to_id};
use crate::config::{BuildOptions, BuildTarget, EmptyEntryScript};
use crate::error::{Error, Result};
use crate::file_types::is_css_file;
use crate::flags::FlagSet;
use crate::graph::orchestrator::{FlagSetResolution, GraphState, GraphWalker};
use crate::graph::{ModuleHost, ResolvedModule};
use crate::matcher::{AdaptiveFs, Matcher, RawResolver};
use crate::module_ref::{AdaptiveImportId, ModuleRef, ModuleRegistry};
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of resolving an import through the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    pub module: ModuleRef,
    /// Id to hand back to the host
    pub id: String,
    pub external: bool,
}

/// Outcome of resolving a web entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryArtifacts {
    pub entry: ResolvedModule,
    /// Host ids of the entry-variant artifacts to emit
    pub artifacts: Vec<String>,
}

/// Per-build state and hook logic
pub struct BuildSession {
    options: BuildOptions,
    matcher: Matcher,
    registry: ModuleRegistry,
    graph: GraphState,
    variants: DashMap<String, Arc<FlagSetResolution>>,
}

impl BuildSession {
    pub fn new(options: BuildOptions, resolver: Box<dyn RawResolver>) -> Self {
        let matcher = Matcher::new(
            resolver,
            options.flag_sets.clone(),
            options.undeclared_alternates,
        );
        Self {
            options,
            matcher,
            registry: ModuleRegistry::new(),
            graph: GraphState::new(),
            variants: DashMap::new(),
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &GraphState {
        &self.graph
    }

    /// Filesystem as one flag set sees it
    pub fn adaptive_fs(&self, flags: FlagSet) -> AdaptiveFs<'_> {
        AdaptiveFs::new(&self.matcher, flags)
    }

    /// Filesystem a virtual-match module is compiled against
    ///
    /// `None` when `id` is not a virtual-match module of this build.
    pub fn virtual_match_fs(&self, id: &str) -> Option<AdaptiveFs<'_>> {
        match self.registry.lookup(id)? {
            ModuleRef::VirtualMatch(_, flags) => Some(self.adaptive_fs(flags)),
            _ => None,
        }
    }

    fn walker<'a>(&'a self, host: &'a dyn ModuleHost) -> GraphWalker<'a> {
        GraphWalker::new(host, &self.matcher, &self.registry, &self.graph)
    }

    fn resolved(&self, module: ModuleRef, external: bool) -> ResolvedImport {
        let id = self.registry.host_id(&module);
        ResolvedImport {
            module,
            id,
            external,
        }
    }

    fn real(&self, resolved: ResolvedModule) -> ResolvedImport {
        ResolvedImport {
            module: ModuleRef::Real(resolved.id.clone()),
            id: resolved.id,
            external: resolved.external,
        }
    }

    fn adaptive_path(&self, aid: AdaptiveImportId) -> Result<String> {
        self.registry
            .adaptive_path(aid)
            .ok_or_else(|| Error::HostError(format!("unknown adaptive import {}", aid)))
    }

    /// Resolve an import, substituting adaptive targets
    ///
    /// `Ok(None)` leaves the import to the host.
    pub async fn resolve_import(
        &self,
        host: &dyn ModuleHost,
        source: &str,
        importer: Option<&str>,
    ) -> Result<Option<ResolvedImport>> {
        match self.options.target {
            BuildTarget::Serve => self.resolve_serve(host, source, importer).await,
            BuildTarget::Server => self.resolve_server(host, source, importer).await,
            BuildTarget::Web => self.resolve_web(host, source, importer).await,
        }
    }

    async fn resolve_serve(
        &self,
        host: &dyn ModuleHost,
        source: &str,
        importer: Option<&str>,
    ) -> Result<Option<ResolvedImport>> {
        let Some(forced) = self.options.forced.as_ref().filter(|f| !f.is_empty()) else {
            return Ok(None);
        };
        if importer.is_none() {
            return Ok(None);
        }
        let Some(resolved) = host.resolve(source, importer).await? else {
            return Ok(None);
        };

        if Path::new(&resolved.id).is_absolute()
            && let Some(matches) = self.matcher.get_matches(&resolved.id)?
        {
            let adapted = matches.pick(forced);
            if adapted != resolved.id {
                debug!("Serving {} for {} under {}", adapted, resolved.id, forced);
                return Ok(Some(self.resolved(ModuleRef::Real(adapted.to_string()), false)));
            }
        }

        Ok(Some(self.real(resolved)))
    }

    async fn resolve_server(
        &self,
        host: &dyn ModuleHost,
        source: &str,
        importer: Option<&str>,
    ) -> Result<Option<ResolvedImport>> {
        let Some(importer) = importer else {
            return Ok(None);
        };

        if source == SERVER_RUNTIME {
            if self.registry.lookup(importer) == Some(ModuleRef::ServerRuntime) {
                // The shim itself imports the real runtime.
                return Ok(host.resolve(source, None).await?.map(|r| self.real(r)));
            }
            return Ok(Some(self.resolved(ModuleRef::ServerRuntime, false)));
        }
        if source == SERVER_PROXY_RUNTIME {
            return Ok(None);
        }

        if let Some(module) = self.registry.lookup(source) {
            return Ok(Some(self.resolved(module, false)));
        }

        match self.registry.lookup(importer) {
            Some(ModuleRef::VirtualMatch(aid, _)) => {
                // Virtual matches resolve relative to the module they clone.
                let origin = self.adaptive_path(aid)?;
                return Box::pin(self.resolve_server(host, source, Some(&origin))).await;
            }
            Some(_) => {
                return Ok(Some(self.resolved(ModuleRef::Real(source.to_string()), false)));
            }
            None => {}
        }

        let Some(resolved) = host.resolve(source, Some(importer)).await? else {
            return Ok(None);
        };
        if resolved.external {
            return Ok(Some(self.real(resolved)));
        }

        if let Some(matches) = self.walker(host).virtual_matches(&resolved).await? {
            let aid = self.registry.adaptive_id(&resolved.id);
            self.graph.record_matches(aid, matches);
            return Ok(Some(self.resolved(ModuleRef::Proxy(aid), false)));
        }

        Ok(Some(self.real(resolved)))
    }

    async fn resolve_web(
        &self,
        host: &dyn ModuleHost,
        source: &str,
        importer: Option<&str>,
    ) -> Result<Option<ResolvedImport>> {
        if let Some(module) = self.registry.lookup(source) {
            return Ok(Some(self.resolved(module, false)));
        }
        let Some(importer) = importer else {
            return Ok(None);
        };
        if self.registry.lookup(importer).is_some() {
            return Ok(Some(self.resolved(ModuleRef::Real(source.to_string()), false)));
        }

        let Some(resolved) = host.resolve(source, Some(importer)).await? else {
            return Ok(None);
        };
        if !resolved.external
            && Path::new(&resolved.id).is_absolute()
            && let Some(aid) = self.walker(host).classify(&resolved.id)?
        {
            return Ok(Some(self.resolved(ModuleRef::Proxy(aid), false)));
        }

        Ok(Some(self.real(resolved)))
    }

    /// Resolve an entry module
    ///
    /// Web builds walk the entry under every declared flag set (or only the
    /// forced one) and register one entry-variant artifact per flag set.
    /// Flag sets that resolve no adaptive import are elided unless
    /// configured otherwise; the empty flag set always gets an artifact
    /// since it is the fallback.
    pub async fn resolve_entry(
        &self,
        host: &dyn ModuleHost,
        entry: &str,
    ) -> Result<Option<EntryArtifacts>> {
        let Some(resolved) = host.resolve(entry, None).await? else {
            return Ok(None);
        };
        if self.options.target != BuildTarget::Web || resolved.external {
            return Ok(Some(EntryArtifacts {
                entry: resolved,
                artifacts: Vec::new(),
            }));
        }

        // A forced flag set makes a single-audience build.
        let forced = self.options.forced.as_ref();
        let flag_sets = match forced {
            Some(forced) => std::slice::from_ref(forced),
            None => self.options.flag_sets.as_slice(),
        };
        let resolution = self.walker(host).resolve_entry(&resolved.id, flag_sets).await?;

        let mut artifacts = Vec::new();
        for pass in resolution.passes {
            if self.options.empty_entry_script == EmptyEntryScript::Elide
                && forced.is_none()
                && !pass.has_adaptive_imports()
                && !pass.flags.is_empty()
            {
                debug!("Eliding artifact of {} for {}", resolved.id, pass.flags);
                continue;
            }

            let id = self.registry.host_id(&ModuleRef::EntryVariant {
                entry: resolved.id.clone(),
                flags: pass.flags.clone(),
            });
            self.variants.insert(id.clone(), Arc::new(pass));
            artifacts.push(id);
        }

        info!("Entry {} has {} flag-set artifact(s)", resolved.id, artifacts.len());
        Ok(Some(EntryArtifacts {
            entry: resolved,
            artifacts,
        }))
    }

    /// Generate code for a synthetic module; `Ok(None)` for real modules
    pub async fn load(&self, host: &dyn ModuleHost, id: &str) -> Result<Option<GeneratedModule>> {
        let Some(module) = self.registry.lookup(id) else {
            return Ok(None);
        };

        let generated = match module {
            ModuleRef::Real(_) => return Ok(None),
            ModuleRef::ServerRuntime => server_runtime_module(self.options.forced.as_ref()),
            ModuleRef::Proxy(aid) => {
                let path = self.adaptive_path(aid)?;
                let matches = self
                    .graph
                    .matches(aid)
                    .ok_or_else(|| Error::HostError(format!("no matches recorded for {}", path)))?;

                match self.options.target {
                    BuildTarget::Server if is_css_file(&path) => css_proxy(&matches),
                    BuildTarget::Server => {
                        let loaded = host.load(&path).await?;
                        server_proxy(&matches, loaded.and_then(|m| m.exports).as_ref())
                    }
                    _ => {
                        let shape = match self.graph.bindings(aid) {
                            // Side-effect imports only: the init module never fills the slot.
                            None => ExportShape::Empty,
                            Some(bindings) => {
                                let loaded = host.load(&path).await?;
                                let exports = loaded.and_then(|m| m.exports);
                                ExportShape::decide(exports.as_ref(), Some(&bindings))
                            }
                        };
                        web_proxy(&self.options.runtime_id, &index_to_id(aid.index()), shape)
                    }
                }
            }
            ModuleRef::Init(aid, concrete) => {
                let path = self.adaptive_path(aid)?;
                init_module(
                    &self.options.runtime_id,
                    &index_to_id(aid.index()),
                    &concrete,
                    self.graph.bindings(aid).as_ref(),
                    is_css_file(&path),
                )
            }
            ModuleRef::VirtualMatch(aid, flags) => {
                let path = self.adaptive_path(aid)?;
                let code = self
                    .graph
                    .virtual_source(aid)
                    .ok_or(Error::MissingSource(path))?;
                GeneratedModule::new(code, SideEffects::True).with_flags(flags)
            }
            ModuleRef::EntryVariant { .. } => {
                let pass = self
                    .variants
                    .get(id)
                    .map(|p| p.clone())
                    .ok_or_else(|| Error::HostError(format!("unknown entry artifact {}", id)))?;
                let init_ids: Vec<String> = pass
                    .resolved
                    .iter()
                    .map(|(aid, concrete)| {
                        self.registry
                            .host_id(&ModuleRef::Init(*aid, concrete.clone()))
                    })
                    .collect();
                entry_variant_module(&init_ids)
            }
        };

        Ok(Some(generated))
    }

    /// Banner for an output chunk (web builds only)
    pub fn banner(&self, is_entry: bool, facade_module_id: Option<&str>) -> String {
        match self.options.target {
            BuildTarget::Web => chunk_banner(&self.options.runtime_id, is_entry, facade_module_id),
            _ => String::new(),
        }
    }

    /// Footer for an output chunk (web builds only)
    pub fn footer(&self, is_entry: bool, facade_module_id: Option<&str>) -> String {
        match self.options.target {
            BuildTarget::Web => chunk_footer(&self.options.runtime_id, is_entry, facade_module_id),
            _ => String::new(),
        }
    }

    /// Drop all per-build state
    pub fn finish(&self) {
        self.matcher.clear_cache();
        self.registry.clear();
        self.graph.clear();
        self.variants.clear();
        info!("Build pass finished, adaptive state cleared");
    }
}
