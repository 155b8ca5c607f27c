// tests/common/mod.rs

//! Shared test utilities: an in-memory host bundler and raw resolver.

#![allow(dead_code)]

use adaptive_imports::config::{AdaptiveConfig, BuildOptions, BuildTarget, parse_config};
use adaptive_imports::flags::FlagSet;
use adaptive_imports::graph::{
    ExportInfo, ImportSpecifier, ImportStatement, LoadedModule, ModuleHost, ResolvedModule,
};
use adaptive_imports::matcher::{RawMatch, RawResolver};
use adaptive_imports::{BuildSession, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Host resolving absolute ids to themselves and listed bare ids as external
#[derive(Debug, Default)]
pub struct MemoryHost {
    modules: HashMap<String, LoadedModule>,
    externals: HashSet<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module importing the default export of each source
    pub fn module(self, id: &str, imports: &[&str]) -> Self {
        let statements = imports
            .iter()
            .map(|source| import(source, vec![ImportSpecifier::Default]))
            .collect();
        self.module_with(id, statements)
    }

    pub fn module_with(mut self, id: &str, imports: Vec<ImportStatement>) -> Self {
        self.modules.entry(id.to_string()).or_default().imports = imports;
        self
    }

    pub fn exports(mut self, id: &str, names: &[&str]) -> Self {
        self.modules.entry(id.to_string()).or_default().exports = Some(ExportInfo {
            names: names.iter().map(|s| s.to_string()).collect(),
            has_default: names.contains(&"default"),
        });
        self
    }

    pub fn scanning(mut self, id: &str, scan_ids: &[&str], source: &str) -> Self {
        let module = self.modules.entry(id.to_string()).or_default();
        module.scan_ids = Some(scan_ids.iter().map(|s| s.to_string()).collect());
        module.source_code = Some(source.to_string());
        self
    }

    pub fn external(mut self, id: &str) -> Self {
        self.externals.insert(id.to_string());
        self
    }
}

#[async_trait]
impl ModuleHost for MemoryHost {
    async fn resolve(
        &self,
        source: &str,
        _importer: Option<&str>,
    ) -> Result<Option<ResolvedModule>> {
        if self.externals.contains(source) {
            return Ok(Some(ResolvedModule::external(source)));
        }
        if source.starts_with('/') {
            return Ok(Some(ResolvedModule::new(source)));
        }
        Ok(None)
    }

    async fn load(&self, id: &str) -> Result<Option<LoadedModule>> {
        Ok(self.modules.get(id).cloned())
    }
}

/// Raw resolver backed by a fixed table
#[derive(Debug, Default)]
pub struct MapResolver(HashMap<String, Vec<RawMatch>>);

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` with its alternates; `path` itself is the default
    pub fn variants(self, path: &str, alternates: &[(&[&str], &str)]) -> Self {
        self.variants_with_default(path, alternates, path)
    }

    pub fn variants_with_default(
        mut self,
        path: &str,
        alternates: &[(&[&str], &str)],
        default: &str,
    ) -> Self {
        let mut raw: Vec<RawMatch> = alternates
            .iter()
            .map(|(flags, value)| RawMatch::new(flags.iter().copied(), *value))
            .collect();
        raw.push(RawMatch::new(Vec::<String>::new(), default));
        self.0.insert(path.to_string(), raw);
        self
    }
}

impl RawResolver for MapResolver {
    fn raw_matches(&self, path: &str) -> Result<Option<Vec<RawMatch>>> {
        Ok(self.0.get(path).cloned())
    }
}

pub fn import(source: &str, specifiers: Vec<ImportSpecifier>) -> ImportStatement {
    ImportStatement {
        source: source.to_string(),
        specifiers,
    }
}

pub fn named(name: &str) -> ImportSpecifier {
    ImportSpecifier::Named(name.to_string())
}

pub fn set(flags: &[&str]) -> FlagSet {
    FlagSet::normalize(flags.iter().copied())
}

/// `flags = ["mobile"]`: declared sets `[]` and `[mobile]`
pub fn mobile_config() -> AdaptiveConfig {
    parse_config("flags = [\"mobile\"]\n").unwrap()
}

pub fn session(
    config: &AdaptiveConfig,
    target: BuildTarget,
    forced: Option<FlagSet>,
    resolver: MapResolver,
) -> BuildSession {
    let options = BuildOptions::new(config, target, forced).unwrap();
    BuildSession::new(options, Box::new(resolver))
}
