// src/module_ref.rs
//! Module references and the host id registry
//!
//! Every module the build talks about is a [`ModuleRef`]. The host bundler
//! only sees opaque string ids, so each synthetic reference is minted a host
//! id once and remembered; host ids are looked up, never parsed by prefix.
//! The single exception is the artifact file name of an entry variant, which
//! comes back from the host after bundling and has to be recognised.

use crate::flags::FlagSet;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

const HOST_ID_PREFIX: &str = "\0arc-";
const HOST_ID_SUFFIX: &str = ".mjs";

/// Host id of the shim standing in for `arc-server` in server builds
pub const SERVER_RUNTIME_SHIM_ID: &str = "\0arc-server-virtual";

static ARTIFACT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+)\.arc(?:\.(.+))?\.html$").unwrap());

static EXTENSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.[^./]+$").unwrap());

/// Identifies one adaptive module for the duration of a build pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdaptiveImportId(u32);

impl AdaptiveImportId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AdaptiveImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", base36(self.0))
    }
}

/// A module as seen by the build
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleRef {
    /// A file on disk (or any id owned by the host)
    Real(String),
    /// Runtime-switching stand-in for an adaptive module
    Proxy(AdaptiveImportId),
    /// Web target: fills the runtime slot of an adaptive module from the
    /// variant chosen for one flag set
    Init(AdaptiveImportId, String),
    /// Server target: a scan-id module cloned for one flag set
    VirtualMatch(AdaptiveImportId, FlagSet),
    /// Web target: the synthetic per-flag-set entry artifact
    EntryVariant { entry: String, flags: FlagSet },
    /// Server target: the runtime shim
    ServerRuntime,
}

impl ModuleRef {
    pub fn is_synthetic(&self) -> bool {
        !matches!(self, ModuleRef::Real(_))
    }

    pub fn adaptive_id(&self) -> Option<AdaptiveImportId> {
        match self {
            ModuleRef::Proxy(aid) | ModuleRef::Init(aid, _) | ModuleRef::VirtualMatch(aid, _) => {
                Some(*aid)
            }
            _ => None,
        }
    }
}

/// Host id of the artifact for one entry and flag set
///
/// `/src/index.ts` with `[ios, mobile]` becomes `/src/index.arc.ios.mobile.html`;
/// the empty flag set drops the flag segment.
pub fn entry_variant_id(entry: &str, flags: &FlagSet) -> String {
    let stem = EXTENSION.replace(entry, "");
    if flags.is_empty() {
        format!("{}.arc.html", stem)
    } else {
        format!("{}.arc.{}.html", stem, flags.to_dotted())
    }
}

/// Recognise an emitted entry artifact name: `(entry name, flag set)`
pub fn parse_artifact_name(file_name: &str) -> Option<(String, FlagSet)> {
    let caps = ARTIFACT_NAME.captures(file_name)?;
    let entry = caps.get(1)?.as_str().to_string();
    let flags = match caps.get(2) {
        Some(flags) => FlagSet::normalize(flags.as_str().split('.')),
        None => FlagSet::empty(),
    };
    Some((entry, flags))
}

/// True for the artifact names [`entry_variant_id`] produces
pub fn is_entry_artifact(file_name: &str) -> bool {
    ARTIFACT_NAME.is_match(file_name)
}

#[derive(Debug, Default)]
struct RegistryState {
    adaptive_ids: HashMap<String, AdaptiveImportId>,
    adaptive_paths: Vec<String>,
    refs: HashMap<String, ModuleRef>,
    host_ids: HashMap<ModuleRef, String>,
    next_init: u32,
}

/// Build-pass registry of adaptive ids and host ids
///
/// Ids are assigned under a single lock with no suspension point in between,
/// so they are monotonic even while flag-set passes run concurrently.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    state: Mutex<RegistryState>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adaptive id for a module path, assigned on first sight
    pub fn adaptive_id(&self, path: &str) -> AdaptiveImportId {
        let mut state = self.state.lock();
        if let Some(aid) = state.adaptive_ids.get(path) {
            return *aid;
        }
        let aid = AdaptiveImportId(state.adaptive_paths.len() as u32);
        state.adaptive_paths.push(path.to_string());
        state.adaptive_ids.insert(path.to_string(), aid);
        aid
    }

    /// Path of the adaptive module behind an id
    pub fn adaptive_path(&self, aid: AdaptiveImportId) -> Option<String> {
        self.state.lock().adaptive_paths.get(aid.index()).cloned()
    }

    /// Host-facing id for a module, minted on first use
    pub fn host_id(&self, module: &ModuleRef) -> String {
        let mut state = self.state.lock();
        if let Some(id) = state.host_ids.get(module) {
            return id.clone();
        }

        let id = match module {
            ModuleRef::Real(path) => return path.clone(),
            ModuleRef::Proxy(aid) => format!("{}proxy:{}{}", HOST_ID_PREFIX, aid, HOST_ID_SUFFIX),
            ModuleRef::Init(_, _) => {
                let n = state.next_init;
                state.next_init += 1;
                format!("{}init:{}{}", HOST_ID_PREFIX, base36(n), HOST_ID_SUFFIX)
            }
            ModuleRef::VirtualMatch(aid, flags) => {
                format!("{}match:{}:{}", HOST_ID_PREFIX, aid, flags.to_dotted())
            }
            ModuleRef::EntryVariant { entry, flags } => entry_variant_id(entry, flags),
            ModuleRef::ServerRuntime => SERVER_RUNTIME_SHIM_ID.to_string(),
        };

        state.refs.insert(id.clone(), module.clone());
        state.host_ids.insert(module.clone(), id.clone());
        id
    }

    /// Synthetic module registered under a host id, if any
    pub fn lookup(&self, host_id: &str) -> Option<ModuleRef> {
        self.state.lock().refs.get(host_id).cloned()
    }

    /// Interpret any host id: registered synthetic modules or a real file
    pub fn module_ref(&self, host_id: &str) -> ModuleRef {
        self.lookup(host_id)
            .unwrap_or_else(|| ModuleRef::Real(host_id.to_string()))
    }

    /// Forget everything (end of a build pass)
    pub fn clear(&self) {
        *self.state.lock() = RegistryState::default();
    }

    pub fn adaptive_count(&self) -> usize {
        self.state.lock().adaptive_paths.len()
    }
}

fn base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
