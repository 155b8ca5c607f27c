// src/lib.rs

//! Adaptive imports
//!
//! Build-time resolution of flag-gated module variants. A module is adaptive
//! when variants of it exist for particular flag sets (`button[mobile].js`
//! next to `button.js`). The build supports a declared list of flag sets:
//!
//! - server bundles contain every variant and switch per request
//! - web bundles get one entry artifact per flag set, each loading only the
//!   variants that flag set selects
//! - an asset manifest appended to the server bundle tells the server which
//!   web artifact to serve for the active flags
//!
//! # Architecture
//!
//! - [`flags`]: flag sets, their order and the declared list
//! - [`matcher`]: raw variant candidates to cached, filtered [`matcher::Matches`]
//! - [`graph`]: the host bundler interface and per-flag-set graph walks
//! - [`codegen`]: proxies, init modules, runtime glue and the asset manifest
//! - [`session`]: per-build state and the host hook bodies
//! - [`bundle`]: the output phase shared by the server and web builds

pub mod bundle;
pub mod codegen;
pub mod config;
mod error;
pub mod file_types;
pub mod flags;
pub mod graph;
pub mod matcher;
pub mod module_ref;
pub mod session;

pub use codegen::{AssetManifest, DocManifest, GeneratedModule};
pub use config::{AdaptiveConfig, BuildOptions, BuildTarget, load_config, parse_config};
pub use error::{Error, Result};
pub use flags::{DeclaredFlagSets, FlagGroup, FlagSet};
pub use graph::{ModuleHost, ResolvedModule};
pub use matcher::{AdaptiveFs, DirectoryResolver, Matcher, Matches, RawResolver};
pub use module_ref::ModuleRef;
pub use session::BuildSession;
