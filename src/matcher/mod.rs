// src/matcher/mod.rs
//! Adaptive module matching
//!
//! A module is adaptive when a raw candidate resolver knows flag-gated
//! variants of it. The matcher turns the resolver's unordered candidates into
//! a [`Matches`] record:
//!
//! - the last raw candidate is the default variant
//! - every other candidate is an alternate, kept only when its flag
//!   requirement is one of the build's declared flag sets
//! - alternates are sorted most specific first, so the first satisfied
//!   alternate wins at selection time
//!
//! A module whose alternates are all filtered away is not adaptive.

pub mod fs;

use crate::error::Result;
use crate::flags::{DeclaredFlagSets, FlagSet};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub use fs::{AdaptiveFs, DirectoryResolver};

/// A variant candidate as reported by a raw resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMatch {
    pub flags: Vec<String>,
    pub value: String,
}

impl RawMatch {
    pub fn new<I, S>(flags: I, value: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flags: flags.into_iter().map(Into::into).collect(),
            value: value.into(),
        }
    }
}

/// One flag-gated variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub flags: FlagSet,
    pub value: String,
}

/// Default variant plus its non-empty, specificity-sorted alternates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matches {
    pub default: String,
    pub alternates: Vec<Match>,
}

/// The variant chosen for an active flag set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    Alternate(&'a Match),
    Default(&'a str),
}

impl<'a> Selection<'a> {
    pub fn value(self) -> &'a str {
        match self {
            Selection::Alternate(m) => m.value.as_str(),
            Selection::Default(value) => value,
        }
    }
}

impl Matches {
    /// First alternate whose flags are all active, else the default
    pub fn select(&self, active: &FlagSet) -> Selection<'_> {
        self.alternates
            .iter()
            .find(|alternate| active.satisfies(&alternate.flags))
            .map(Selection::Alternate)
            .unwrap_or(Selection::Default(&self.default))
    }

    /// Path of the variant chosen for an active flag set
    pub fn pick(&self, active: &FlagSet) -> &str {
        self.select(active).value()
    }

    /// Every variant path: alternates first, default last
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.alternates
            .iter()
            .map(|m| m.value.as_str())
            .chain(std::iter::once(self.default.as_str()))
    }
}

/// How alternates gated on undeclared flag sets are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UndeclaredAlternates {
    /// Ignore the alternate; the module stays adaptive if others survive
    #[default]
    Drop,
    /// Treat the whole module as non-adaptive
    NonAdaptive,
}

/// Source of raw variant candidates (the on-disk naming convention)
pub trait RawResolver: Send + Sync {
    /// Candidates for an absolute path, default last
    ///
    /// `Ok(None)` means the path is not adaptive. Errors are reserved for
    /// real failures and abort the build.
    fn raw_matches(&self, path: &str) -> Result<Option<Vec<RawMatch>>>;

    /// Drop any cached scan results
    fn clear_cache(&self) {}
}

/// Build a [`Matches`] record from raw candidates
pub fn matches_from_raw(
    raw: &[RawMatch],
    declared: &DeclaredFlagSets,
    policy: UndeclaredAlternates,
) -> Option<Matches> {
    let (default, candidates) = raw.split_last()?;
    let mut alternates: Vec<Match> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let flags = FlagSet::normalize(candidate.flags.iter().cloned());
        if flags.is_empty() {
            debug!("Ignoring unflagged alternate {}", candidate.value);
            continue;
        }

        if !declared.contains(&flags) {
            match policy {
                UndeclaredAlternates::Drop => {
                    debug!(
                        "Dropping alternate {} for undeclared flags {}",
                        candidate.value, flags
                    );
                    continue;
                }
                UndeclaredAlternates::NonAdaptive => {
                    debug!(
                        "Alternate {} uses undeclared flags {}, treating {} as non-adaptive",
                        candidate.value, flags, default.value
                    );
                    return None;
                }
            }
        }

        alternates.push(Match {
            flags,
            value: candidate.value.clone(),
        });
    }

    // Stable sort keeps the resolver's first candidate among duplicates.
    alternates.sort_by(|a, b| a.flags.cmp(&b.flags));
    let before = alternates.len();
    alternates.dedup_by(|later, earlier| later.flags == earlier.flags);
    if alternates.len() != before {
        warn!(
            "Duplicate flag requirements among alternates of {}",
            default.value
        );
    }

    if alternates.is_empty() {
        return None;
    }

    Some(Matches {
        default: default.value.clone(),
        alternates,
    })
}

/// Cached matcher for one build session
pub struct Matcher {
    resolver: Box<dyn RawResolver>,
    declared: DeclaredFlagSets,
    policy: UndeclaredAlternates,
    cache: DashMap<String, Option<Arc<Matches>>>,
}

impl Matcher {
    pub fn new(
        resolver: Box<dyn RawResolver>,
        declared: DeclaredFlagSets,
        policy: UndeclaredAlternates,
    ) -> Self {
        Self {
            resolver,
            declared,
            policy,
            cache: DashMap::new(),
        }
    }

    pub fn declared(&self) -> &DeclaredFlagSets {
        &self.declared
    }

    /// Matches for a module id, or `None` when it is not adaptive
    ///
    /// Ids with a query suffix and relative ids are never adaptive.
    pub fn get_matches(&self, id: &str) -> Result<Option<Arc<Matches>>> {
        if id.contains('?') || !Path::new(id).is_absolute() {
            return Ok(None);
        }

        if let Some(cached) = self.cache.get(id) {
            return Ok(cached.clone());
        }

        let matches = self
            .resolver
            .raw_matches(id)?
            .and_then(|raw| matches_from_raw(&raw, &self.declared, self.policy))
            .map(Arc::new);

        if let Some(ref m) = matches {
            debug!("{} is adaptive with {} alternate(s)", id, m.alternates.len());
        }
        self.cache.insert(id.to_string(), matches.clone());
        Ok(matches)
    }

    /// Whether a module id is adaptive
    pub fn is_adaptive(&self, id: &str) -> Result<bool> {
        Ok(self.get_matches(id)?.is_some())
    }

    /// Forget every cached result (end of a build pass)
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.resolver.clear_cache();
    }

    /// Number of cached lookups
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::flags::FlagGroup;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn set(flags: &[&str]) -> FlagSet {
        FlagSet::normalize(flags.iter().copied())
    }

    fn mobile_declared() -> DeclaredFlagSets {
        DeclaredFlagSets::from_sets(vec![Vec::<String>::new(), vec!["mobile".to_string()]])
            .unwrap()
    }

    fn drop_undeclared(raw: &[RawMatch]) -> Option<Matches> {
        matches_from_raw(raw, &mobile_declared(), UndeclaredAlternates::Drop)
    }

    struct MapResolver {
        entries: HashMap<String, Vec<RawMatch>>,
        calls: AtomicUsize,
    }

    impl MapResolver {
        fn new(entries: Vec<(&str, Vec<RawMatch>)>) -> Self {
            Self {
                entries: entries
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RawResolver for MapResolver {
        fn raw_matches(&self, path: &str) -> Result<Option<Vec<RawMatch>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path == "/broken.js" {
                return Err(Error::ResolverError {
                    path: path.to_string(),
                    reason: "unreadable".to_string(),
                });
            }
            Ok(self.entries.get(path).cloned())
        }
    }

    // === matches_from_raw tests ===

    #[test]
    fn test_matches_round_trip() {
        let raw = vec![
            RawMatch::new(["mobile"], "B"),
            RawMatch::new(Vec::<String>::new(), "A"),
        ];
        let matches = drop_undeclared(&raw).unwrap();
        assert_eq!(
            matches,
            Matches {
                default: "A".to_string(),
                alternates: vec![Match {
                    flags: set(&["mobile"]),
                    value: "B".to_string(),
                }],
            }
        );
    }

    #[test]
    fn test_select_by_active_flags() {
        let raw = vec![
            RawMatch::new(["mobile"], "B"),
            RawMatch::new(Vec::<String>::new(), "A"),
        ];
        let matches = drop_undeclared(&raw).unwrap();
        assert_eq!(matches.pick(&set(&["mobile"])), "B");
        assert_eq!(matches.pick(&set(&[])), "A");
        assert!(matches!(matches.select(&set(&[])), Selection::Default("A")));
    }

    #[test]
    fn test_picked_value_outlives_selection() {
        let raw = vec![
            RawMatch::new(["mobile"], "B"),
            RawMatch::new(Vec::<String>::new(), "A"),
        ];
        let matches = drop_undeclared(&raw).unwrap();

        // Both the selection and the active set are temporaries here.
        let picked = matches.pick(&set(&["mobile"]));
        let fallback = matches.select(&set(&[])).value();
        assert_eq!((picked, fallback), ("B", "A"));
    }

    #[test]
    fn test_undeclared_alternates_filtered() {
        let raw = vec![
            RawMatch::new(["tablet"], "T"),
            RawMatch::new(Vec::<String>::new(), "A"),
        ];
        assert!(drop_undeclared(&raw).is_none());
    }

    #[test]
    fn test_undeclared_policy_non_adaptive() {
        let raw = vec![
            RawMatch::new(["mobile"], "B"),
            RawMatch::new(["tablet"], "T"),
            RawMatch::new(Vec::<String>::new(), "A"),
        ];
        let dropped = drop_undeclared(&raw).unwrap();
        assert_eq!(dropped.alternates.len(), 1);
        assert!(
            matches_from_raw(&raw, &mobile_declared(), UndeclaredAlternates::NonAdaptive).is_none()
        );
    }

    #[test]
    fn test_single_candidate_not_adaptive() {
        let raw = vec![RawMatch::new(Vec::<String>::new(), "A")];
        assert!(drop_undeclared(&raw).is_none());
        assert!(drop_undeclared(&[]).is_none());
    }

    #[test]
    fn test_alternates_most_specific_first() {
        let declared = DeclaredFlagSets::from_groups(&[
            FlagGroup::Single("mobile".into()),
            FlagGroup::Exclusive(vec!["ios".into(), "android".into()]),
        ])
        .unwrap();
        let raw = vec![
            RawMatch::new(["mobile"], "m"),
            RawMatch::new(["ios", "mobile"], "mi"),
            RawMatch::new(["android"], "a"),
            RawMatch::new(Vec::<String>::new(), "d"),
        ];
        let matches = matches_from_raw(&raw, &declared, UndeclaredAlternates::Drop).unwrap();
        let order: Vec<&str> = matches.alternates.iter().map(|m| m.value.as_str()).collect();
        assert_eq!(order, vec!["mi", "a", "m"]);

        assert_eq!(matches.pick(&set(&["ios", "mobile"])), "mi");
        assert_eq!(matches.pick(&set(&["android", "mobile"])), "a");
        assert_eq!(matches.pick(&set(&["mobile"])), "m");
        assert_eq!(matches.pick(&set(&["ios"])), "d");
    }

    #[test]
    fn test_duplicate_flag_requirements_keep_first() {
        let raw = vec![
            RawMatch::new(["mobile"], "first"),
            RawMatch::new(["mobile", "mobile"], "second"),
            RawMatch::new(Vec::<String>::new(), "d"),
        ];
        let matches = drop_undeclared(&raw).unwrap();
        assert_eq!(matches.alternates.len(), 1);
        assert_eq!(matches.alternates[0].value, "first");
    }

    #[test]
    fn test_unflagged_alternate_ignored() {
        let raw = vec![
            RawMatch::new(Vec::<String>::new(), "other"),
            RawMatch::new(["mobile"], "B"),
            RawMatch::new(Vec::<String>::new(), "A"),
        ];
        let matches = drop_undeclared(&raw).unwrap();
        assert_eq!(matches.values().collect::<Vec<_>>(), vec!["B", "A"]);
    }

    // === Matcher tests ===

    #[test]
    fn test_matcher_fast_fails() {
        let resolver = MapResolver::new(vec![]);
        let matcher = Matcher::new(
            Box::new(resolver),
            mobile_declared(),
            UndeclaredAlternates::Drop,
        );
        assert!(matcher.get_matches("relative/a.js").unwrap().is_none());
        assert!(matcher.get_matches("/abs/a.js?raw").unwrap().is_none());
        assert_eq!(matcher.cached(), 0);
    }

    #[test]
    fn test_matcher_caches_until_cleared() {
        let resolver = MapResolver::new(vec![(
            "/src/a.js",
            vec![
                RawMatch::new(["mobile"], "/src/a[mobile].js"),
                RawMatch::new(Vec::<String>::new(), "/src/a.js"),
            ],
        )]);
        let matcher = Matcher::new(
            Box::new(resolver),
            mobile_declared(),
            UndeclaredAlternates::Drop,
        );

        assert!(matcher.is_adaptive("/src/a.js").unwrap());
        assert!(matcher.is_adaptive("/src/a.js").unwrap());
        assert!(!matcher.is_adaptive("/src/b.js").unwrap());
        assert_eq!(matcher.cached(), 2);

        matcher.clear_cache();
        assert_eq!(matcher.cached(), 0);
    }

    #[test]
    fn test_matcher_propagates_resolver_errors() {
        let matcher = Matcher::new(
            Box::new(MapResolver::new(vec![])),
            mobile_declared(),
            UndeclaredAlternates::Drop,
        );
        assert!(matches!(
            matcher.get_matches("/broken.js"),
            Err(Error::ResolverError { .. })
        ));
    }
}
