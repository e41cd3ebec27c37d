//! Domain types for the seasonal ranking mirror.
//!
//! Newtype wrappers keep catalog subject IDs, remote index IDs and local
//! season keys from being mixed up at call sites.

pub mod season;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use season::{InvalidSeasonKey, SeasonKey};

/// Identifier of a catalog subject (one anime entry on the remote API).
///
/// # Examples
///
/// ```rust
/// use seasonrank::domain::SubjectId;
///
/// let id = SubjectId::new(42);
/// assert_eq!(id.value(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(i32);

impl SubjectId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SubjectId> for i32 {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

impl From<i32> for SubjectId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

/// Identifier of a remote index (a curated collection of subjects).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IndexId(i32);

impl IndexId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<IndexId> for i32 {
    fn from(id: IndexId) -> Self {
        id.0
    }
}

impl From<i32> for IndexId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}
