// src/codegen/mod.rs
//! Code generation for adaptive modules
//!
//! Generated modules switch between pre-bundled variants at runtime. The
//! switch is a chain of conditionals over the active flags object `f`,
//! most specific requirement first:
//!
//! ```text
//! f.ios&&f.mobile?_h:f.mobile?_j:_k
//! ```

pub mod ident;
pub mod manifest;
pub mod proxy;
pub mod runtime;

use crate::flags::FlagSet;
use crate::graph::{BindingSet, ExportInfo};
use std::fmt::Display;

pub use ident::index_to_id;
pub use manifest::{AssetManifest, DocManifest, FlaggedManifest, ManifestPart};

/// How the host may tree-shake a generated module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffects {
    False,
    True,
    /// Keep the module and all of its imports
    NoTreeshake,
}

/// Where the host should source named exports it cannot find statically
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntheticExports {
    None,
    /// From the default export
    Default,
    /// From the named export
    Key(String),
}

/// A module produced by the build instead of read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    pub code: String,
    pub synthetic_named_exports: SyntheticExports,
    pub side_effects: SideEffects,
    /// Flag set a virtual match was loaded under
    pub flags: Option<FlagSet>,
}

impl GeneratedModule {
    pub fn new(code: impl Into<String>, side_effects: SideEffects) -> Self {
        Self {
            code: code.into(),
            synthetic_named_exports: SyntheticExports::None,
            side_effects,
            flags: None,
        }
    }

    pub fn with_synthetic_exports(mut self, synthetic: SyntheticExports) -> Self {
        self.synthetic_named_exports = synthetic;
        self
    }

    pub fn with_flags(mut self, flags: FlagSet) -> Self {
        self.flags = Some(flags);
        self
    }
}

/// Export surface a proxy re-creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportShape {
    /// Nothing to re-export
    Empty,
    /// Only `default`
    DefaultOnly,
    /// Named exports, plus `default` when present
    Named { has_default: bool },
    /// Exports unknown: expose the whole namespace
    Namespace,
}

impl ExportShape {
    /// Pick the shape from a module's exports, restricted to the bindings
    /// its importers read when those are known
    pub fn decide(exports: Option<&ExportInfo>, bindings: Option<&BindingSet>) -> Self {
        let Some(exports) = exports else {
            return ExportShape::Namespace;
        };

        let (named, has_default) = match bindings {
            Some(BindingSet::Names(used)) => (
                exports
                    .names
                    .iter()
                    .filter(|name| name.as_str() != "default" && used.contains(*name))
                    .count(),
                exports.has_default && used.contains("default"),
            ),
            _ => (exports.named_count(), exports.has_default),
        };

        match (named, has_default) {
            (0, false) => ExportShape::Empty,
            (0, true) => ExportShape::DefaultOnly,
            (_, has_default) => ExportShape::Named { has_default },
        }
    }
}

/// `f.a&&f.b` (an empty requirement is always true)
pub fn flag_condition(flags: &FlagSet) -> String {
    if flags.is_empty() {
        return "true".to_string();
    }
    flags
        .iter()
        .map(|flag| format!("f.{}", flag))
        .collect::<Vec<_>>()
        .join("&&")
}

/// `cond1?v1:cond2?v2:default`; just `default` without branches
pub fn switch_expression<'a, T, I>(branches: I, default: T) -> String
where
    T: Display,
    I: IntoIterator<Item = (&'a FlagSet, T)>,
{
    let mut code = String::new();
    for (flags, value) in branches {
        code.push_str(&format!("{}?{}:", flag_condition(flags), value));
    }
    code.push_str(&default.to_string());
    code
}

/// JavaScript string literal for a value
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn set(flags: &[&str]) -> FlagSet {
        FlagSet::normalize(flags.iter().copied())
    }

    fn exports(names: &[&str]) -> ExportInfo {
        ExportInfo {
            names: names.iter().map(|s| s.to_string()).collect(),
            has_default: names.contains(&"default"),
        }
    }

    // === Switch expression tests ===

    #[test]
    fn test_switch_expression() {
        let ios = set(&["ios", "mobile"]);
        let mobile = set(&["mobile"]);
        assert_eq!(
            switch_expression([(&ios, "_h"), (&mobile, "_j")], "_k"),
            "f.ios&&f.mobile?_h:f.mobile?_j:_k"
        );
        assert_eq!(switch_expression(Vec::<(&FlagSet, &str)>::new(), "_h"), "_h");
    }

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("/src/a.js"), r#""/src/a.js""#);
        assert_eq!(js_string("a\"b"), r#""a\"b""#);
    }

    // === Export shape tests ===

    #[test]
    fn test_shape_table() {
        assert_eq!(ExportShape::decide(Some(&exports(&[])), None), ExportShape::Empty);
        assert_eq!(
            ExportShape::decide(Some(&exports(&["default"])), None),
            ExportShape::DefaultOnly
        );
        assert_eq!(
            ExportShape::decide(Some(&exports(&["a"])), None),
            ExportShape::Named { has_default: false }
        );
        assert_eq!(
            ExportShape::decide(Some(&exports(&["default", "a"])), None),
            ExportShape::Named { has_default: true }
        );
    }

    #[test]
    fn test_shape_unknown_exports_is_namespace() {
        assert_eq!(ExportShape::decide(None, None), ExportShape::Namespace);
    }

    #[test]
    fn test_shape_restricted_to_bindings() {
        let info = exports(&["default", "a", "b"]);
        let only_default = BindingSet::Names(BTreeSet::from(["default".to_string()]));
        assert_eq!(
            ExportShape::decide(Some(&info), Some(&only_default)),
            ExportShape::DefaultOnly
        );

        let only_a = BindingSet::Names(BTreeSet::from(["a".to_string()]));
        assert_eq!(
            ExportShape::decide(Some(&info), Some(&only_a)),
            ExportShape::Named { has_default: false }
        );

        assert_eq!(
            ExportShape::decide(Some(&info), Some(&BindingSet::WholeNamespace)),
            ExportShape::Named { has_default: true }
        );
    }
}
