// src/graph/bindings.rs
//! Binding discovery for adaptive imports

use super::{ImportSpecifier, ImportStatement};
use std::collections::BTreeSet;

/// Names imported from one adaptive module across all of its importers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSet {
    /// A namespace import: every export may be read
    WholeNamespace,
    Names(BTreeSet<String>),
}

impl BindingSet {
    pub fn is_namespace(&self) -> bool {
        matches!(self, BindingSet::WholeNamespace)
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            BindingSet::WholeNamespace => true,
            BindingSet::Names(names) => names.contains(name),
        }
    }

    /// Fold one import specifier in; a namespace import absorbs everything
    pub fn add(&mut self, specifier: &ImportSpecifier) {
        if let ImportSpecifier::Namespace = specifier {
            *self = BindingSet::WholeNamespace;
            return;
        }
        if let BindingSet::Names(names) = self {
            match specifier {
                ImportSpecifier::Default => {
                    names.insert("default".to_string());
                }
                ImportSpecifier::Named(name) => {
                    names.insert(name.clone());
                }
                ImportSpecifier::Namespace => {}
            }
        }
    }
}

/// Fold a statement's specifiers into an existing binding set
///
/// Statements without specifiers (`import "./a"`) create nothing, so a module
/// imported only for side effects has no bindings at all.
pub fn accumulate_bindings(
    current: Option<BindingSet>,
    statement: &ImportStatement,
) -> Option<BindingSet> {
    let mut bindings = current;
    for specifier in &statement.specifiers {
        bindings
            .get_or_insert_with(|| BindingSet::Names(BTreeSet::new()))
            .add(specifier);
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(specifiers: Vec<ImportSpecifier>) -> ImportStatement {
        ImportStatement {
            source: "./a".to_string(),
            specifiers,
        }
    }

    #[test]
    fn test_named_import() {
        let bindings = accumulate_bindings(
            None,
            &statement(vec![ImportSpecifier::Named("x".into())]),
        );
        assert_eq!(
            bindings,
            Some(BindingSet::Names(BTreeSet::from(["x".to_string()])))
        );
    }

    #[test]
    fn test_namespace_import_wins() {
        let bindings = accumulate_bindings(
            None,
            &statement(vec![ImportSpecifier::Default, ImportSpecifier::Named("x".into())]),
        );
        let bindings = accumulate_bindings(bindings, &statement(vec![ImportSpecifier::Namespace]));
        assert_eq!(bindings, Some(BindingSet::WholeNamespace));

        let named = statement(vec![ImportSpecifier::Named("y".into())]);
        let bindings = accumulate_bindings(bindings, &named);
        assert!(bindings.unwrap().is_namespace());
    }

    #[test]
    fn test_accumulates_across_importers() {
        let bindings = accumulate_bindings(None, &statement(vec![ImportSpecifier::Default]));
        let named = statement(vec![ImportSpecifier::Named("y".into())]);
        let bindings = accumulate_bindings(bindings, &named).unwrap();
        assert!(bindings.contains("default"));
        assert!(bindings.contains("y"));
        assert!(!bindings.contains("z"));
    }

    #[test]
    fn test_side_effect_import_has_no_bindings() {
        assert_eq!(accumulate_bindings(None, &statement(vec![])), None);
    }
}
