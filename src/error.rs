// src/error.rs

//! Crate-wide error type

use thiserror::Error;

/// Errors raised while declaring flags, resolving adaptive modules or
/// writing build output
#[derive(Debug, Error)]
pub enum Error {
    /// A flag or flag group declaration is malformed
    #[error("Invalid flag declaration: {0}")]
    InvalidFlag(String),

    /// Configuration could not be interpreted
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The raw candidate resolver failed for a reason other than "not adaptive"
    #[error("Resolver error for {path}: {reason}")]
    ResolverError { path: String, reason: String },

    /// An adaptive chain selected a variant that leads back into itself
    #[error("Adaptive cycle detected for flags [{flags}]: {}", chain.join(" -> "))]
    AdaptiveCycle { chain: Vec<String>, flags: String },

    /// The host bundler reported a failure
    #[error("Host error: {0}")]
    HostError(String),

    /// A module declared scan ids without providing its source code
    #[error("Module {0} provides scan ids but no source code")]
    MissingSource(String),

    /// The build output phase was invoked in a way it cannot honour
    #[error("Build contract violation: {0}")]
    BuildContract(String),

    /// The server entry hand-off store could not be read or written
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
