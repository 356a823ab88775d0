//! Tag sets and tag-based admission of groups
//!
//! A group is admitted when every requested filter tag is among its declared tags.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered set of tag names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// Create an empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list, trimming whitespace and dropping empty entries
    pub fn parse_list(s: &str) -> Self {
        s.split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .collect()
    }

    /// Add a tag, returning whether it was new
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether every tag in `self` is also in `other`
    pub fn is_subset(&self, other: &TagSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(","))
    }
}

/// Whether a group declaring `declared` tags passes the `filter`
///
/// An empty filter admits everything. A non-empty filter requires all of its tags
/// to be declared, so an untagged group is never admitted by a non-empty filter.
pub fn admits(declared: &TagSet, filter: &TagSet) -> bool {
    filter.is_subset(declared)
}

/// Outcome of running the tag filter over a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No filter configured; the group keeps its pending state
    Unfiltered,
    /// The group was skipped by its author and stays pending
    ManuallySkipped,
    /// The group declares every requested tag
    Admitted,
    /// The group is missing at least one requested tag
    Rejected,
}

impl Admission {
    /// Decide admission for a group
    pub fn decide(declared: &TagSet, filter: Option<&TagSet>, manually_skipped: bool) -> Self {
        let Some(filter) = filter.filter(|f| !f.is_empty()) else {
            return Admission::Unfiltered;
        };

        if manually_skipped {
            return Admission::ManuallySkipped;
        }

        if admits(declared, filter) {
            Admission::Admitted
        } else {
            Admission::Rejected
        }
    }

    /// The pending flag the group should carry, given its current one
    pub fn pending(self, current: bool) -> bool {
        match self {
            Admission::Unfiltered => current,
            Admission::ManuallySkipped => true,
            Admission::Admitted => false,
            Admission::Rejected => true,
        }
    }
}
