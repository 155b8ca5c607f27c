// src/config.rs

//! Build configuration
//!
//! ```toml
//! runtime_id = "shop"
//! flags = ["mobile", ["ios", "android"]]
//! undeclared_alternates = "drop"
//! empty_entry_script = "elide"
//! ```
//!
//! Exactly one of `flags` (groups) or `flag_sets` (explicit sets) declares
//! the supported audiences.

use crate::error::{Error, Result};
use crate::flags::{
    DeclaredFlagSets, FlagGroup, FlagSet, forced_flag_set, forced_flag_set_from_env,
};
use crate::matcher::UndeclaredAlternates;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default configuration file name
pub const CONFIG_FILE: &str = "adaptive.toml";

/// How flag sets that resolve no adaptive import are emitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyEntryScript {
    /// No artifact: the default artifact already covers the audience
    #[default]
    Elide,
    /// An artifact with an empty script
    Shell,
}

/// Which bundle is being built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildTarget {
    /// Server bundle: every variant, switched per request
    Server,
    /// Browser bundle: one artifact per flag set
    Web,
    /// Dev server: adaptive imports follow the forced flag set, if any
    Serve,
}

/// Configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Suffix for the runtime global (`arc_<runtime_id>`)
    #[serde(default)]
    pub runtime_id: Option<String>,

    /// Flag groups: a flag name, or a list of mutually exclusive flags
    #[serde(default)]
    pub flags: Option<Vec<FlagGroup>>,

    /// Explicit flag sets
    #[serde(default)]
    pub flag_sets: Option<Vec<Vec<String>>>,

    #[serde(default)]
    pub undeclared_alternates: UndeclaredAlternates,

    #[serde(default)]
    pub empty_entry_script: EmptyEntryScript,
}

impl AdaptiveConfig {
    /// Check the declaration is complete and unambiguous
    pub fn validate(&self) -> Result<()> {
        match (&self.flags, &self.flag_sets) {
            (Some(_), Some(_)) => {
                return Err(Error::ConfigError(
                    "declare either 'flags' or 'flag_sets', not both".to_string(),
                ));
            }
            (None, None) => {
                return Err(Error::ConfigError(
                    "one of 'flags' or 'flag_sets' is required".to_string(),
                ));
            }
            _ => {}
        }

        if let Some(id) = &self.runtime_id
            && !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            return Err(Error::ConfigError(format!(
                "runtime_id '{}' must only contain letters, digits, '_' or '$'",
                id
            )));
        }

        self.declared_flag_sets().map(|_| ())
    }

    /// Every flag set the build supports
    pub fn declared_flag_sets(&self) -> Result<DeclaredFlagSets> {
        match (&self.flags, &self.flag_sets) {
            (Some(groups), _) => DeclaredFlagSets::from_groups(groups),
            (None, Some(sets)) => DeclaredFlagSets::from_sets(sets.iter().cloned()),
            (None, None) => Ok(DeclaredFlagSets::default()),
        }
    }
}

/// Parse configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AdaptiveConfig> {
    debug!("Loading configuration from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<AdaptiveConfig> {
    let config: AdaptiveConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Resolved options for one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub target: BuildTarget,
    /// Runtime global name (`arc` or `arc_<id>`)
    pub runtime_id: String,
    pub flag_sets: DeclaredFlagSets,
    pub forced: Option<FlagSet>,
    pub undeclared_alternates: UndeclaredAlternates,
    pub empty_entry_script: EmptyEntryScript,
}

impl BuildOptions {
    pub fn new(
        config: &AdaptiveConfig,
        target: BuildTarget,
        forced: Option<FlagSet>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            target,
            runtime_id: crate::codegen::runtime::runtime_global(config.runtime_id.as_deref()),
            flag_sets: config.declared_flag_sets()?,
            forced,
            undeclared_alternates: config.undeclared_alternates,
            empty_entry_script: config.empty_entry_script,
        })
    }

    /// Options with the forced flag set taken from the `FLAGS` variable
    pub fn from_env(config: &AdaptiveConfig, target: BuildTarget) -> Result<Self> {
        Self::new(config, target, forced_flag_set_from_env()?)
    }

    /// Options with the forced flag set given in its dot-joined form
    pub fn with_forced_value(
        config: &AdaptiveConfig,
        target: BuildTarget,
        forced: Option<&str>,
    ) -> Result<Self> {
        Self::new(config, target, forced_flag_set(forced)?)
    }
}
