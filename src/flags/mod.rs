// src/flags/mod.rs
//! Flag-set algebra
//!
//! A flag names a runtime audience (device class, experiment bucket, ...).
//! Adaptive modules gate their variants on sets of flags, and a build declares
//! up front which flag combinations it supports.
//!
//! Flag sets are kept canonical: deduplicated and sorted by byte-wise string
//! order. Flag sets themselves are totally ordered by specificity: more flags
//! sort first, and equal-length sets compare element by element starting from
//! the last flag. Every sort that breaks ties on specificity uses this order.
//!
//! Flags are declared in groups: `["mobile", ["ios", "android"]]` declares an
//! optional `mobile` flag and a mutually exclusive `ios`/`android` pair, which
//! yields six flag sets (none, one of each, or `mobile` plus one of the pair).

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Environment variable carrying a forced flag-set (dot-joined)
pub const FORCED_FLAGS_ENV: &str = "FLAGS";

// Flags are emitted as `f.<flag>` property reads in generated code.
static FLAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());

/// Check that a flag name can be declared
pub fn validate_flag(flag: &str) -> Result<()> {
    if flag.is_empty() {
        return Err(Error::InvalidFlag("empty flag name".to_string()));
    }
    if !FLAG_NAME.is_match(flag) {
        return Err(Error::InvalidFlag(format!(
            "'{}' is not a valid flag name (expected an identifier without '.')",
            flag
        )));
    }
    Ok(())
}

/// A canonical set of flags: deduplicated and sorted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct FlagSet(Vec<String>);

impl FlagSet {
    /// The empty flag set (the default audience)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Normalize raw flags into their canonical form
    pub fn normalize<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut flags: Vec<String> = flags.into_iter().map(Into::into).collect();
        flags.sort();
        flags.dedup();
        Self(flags)
    }

    /// Parse a dot-joined flag list (`"mobile.ios"`); `""` is the empty set
    pub fn parse_dotted(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }
        let flags: Vec<&str> = s.split('.').collect();
        for flag in &flags {
            validate_flag(flag)?;
        }
        Ok(Self::normalize(flags))
    }

    /// Dot-joined form, the inverse of [`FlagSet::parse_dotted`]
    pub fn to_dotted(&self) -> String {
        self.0.join(".")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Check whether a single flag is active (binary search)
    pub fn has(&self, flag: &str) -> bool {
        self.0
            .binary_search_by(|candidate| candidate.as_str().cmp(flag))
            .is_ok()
    }

    /// Check whether every required flag is active
    pub fn satisfies(&self, required: &FlagSet) -> bool {
        satisfies(self, required.as_slice())
    }
}

/// True iff every flag in `required` is present in `active`
pub fn satisfies<S: AsRef<str>>(active: &FlagSet, required: &[S]) -> bool {
    required.iter().all(|flag| active.has(flag.as_ref()))
}

/// Specificity order: longer sets first, then element-wise from the end
pub fn compare(a: &FlagSet, b: &FlagSet) -> Ordering {
    b.0.len().cmp(&a.0.len()).then_with(|| {
        for (x, y) in a.0.iter().rev().zip(b.0.iter().rev()) {
            match x.cmp(y) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    })
}

impl Ord for FlagSet {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl PartialOrd for FlagSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<Vec<String>> for FlagSet {
    fn from(flags: Vec<String>) -> Self {
        Self::normalize(flags)
    }
}

impl From<FlagSet> for Vec<String> {
    fn from(flags: FlagSet) -> Self {
        flags.0
    }
}

impl<'a> IntoIterator for &'a FlagSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// One flag group of a declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagGroup {
    /// An optional flag
    Single(String),
    /// Mutually exclusive flags: at most one is active
    Exclusive(Vec<String>),
}

impl FlagGroup {
    fn flags(&self) -> Result<Vec<&str>> {
        match self {
            Self::Single(flag) => {
                validate_flag(flag)?;
                Ok(vec![flag.as_str()])
            }
            Self::Exclusive(flags) => {
                if flags.is_empty() {
                    return Err(Error::InvalidFlag(
                        "empty mutually exclusive flag group".to_string(),
                    ));
                }
                for flag in flags {
                    validate_flag(flag)?;
                }
                Ok(flags.iter().map(String::as_str).collect())
            }
        }
    }
}

/// Every flag set a build supports, sorted by specificity
///
/// The empty set is always present: it is the default audience.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeclaredFlagSets {
    sets: Vec<FlagSet>,
}

impl DeclaredFlagSets {
    /// Build the powerset of flag groups
    pub fn from_groups(groups: &[FlagGroup]) -> Result<Self> {
        let mut raw: Vec<Vec<String>> = vec![Vec::new()];

        for group in groups {
            let built = raw.len();
            for flag in group.flags()? {
                for i in (0..built).rev() {
                    let mut child = raw[i].clone();
                    child.push(flag.to_string());
                    raw.push(child);
                }
            }
        }

        Ok(Self::from_normalized(
            raw.into_iter().map(FlagSet::normalize).collect(),
        ))
    }

    /// Use an explicit list of flag sets
    pub fn from_sets<I, S>(sets: I) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<S>>,
        S: Into<String>,
    {
        let mut normalized = Vec::new();
        for set in sets {
            let set = FlagSet::normalize(set);
            for flag in &set {
                validate_flag(flag)?;
            }
            normalized.push(set);
        }
        Ok(Self::from_normalized(normalized))
    }

    fn from_normalized(mut sets: Vec<FlagSet>) -> Self {
        sets.push(FlagSet::empty());
        sets.sort();
        sets.dedup();
        Self { sets }
    }

    /// Exact membership test (binary search over the sorted list)
    pub fn contains(&self, candidate: &FlagSet) -> bool {
        self.sets.binary_search(candidate).is_ok()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FlagSet> {
        self.sets.iter()
    }

    pub fn as_slice(&self) -> &[FlagSet] {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// True when only the empty set is declared
    pub fn is_trivial(&self) -> bool {
        self.sets.len() <= 1
    }
}

impl<'a> IntoIterator for &'a DeclaredFlagSets {
    type Item = &'a FlagSet;
    type IntoIter = std::slice::Iter<'a, FlagSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.sets.iter()
    }
}

/// Interpret a forced flag-set value
///
/// `None` means no forcing, `Some("")` forces the empty set, anything else is
/// a dot-joined flag list.
pub fn forced_flag_set(value: Option<&str>) -> Result<Option<FlagSet>> {
    value.map(FlagSet::parse_dotted).transpose()
}

/// Read the forced flag-set from the `FLAGS` environment variable
pub fn forced_flag_set_from_env() -> Result<Option<FlagSet>> {
    let value = std::env::var(FORCED_FLAGS_ENV).ok();
    forced_flag_set(value.as_deref())
}
