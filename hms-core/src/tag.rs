//! Entity tags driving cache invalidation.
//!
//! Tags are flat, opaque labels. `Patient` and `Patient:42` are unrelated
//! strings as far as the cache is concerned: invalidating the collection tag
//! does not reach instance tags unless the mutation declares both.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const PATIENT: &str = "Patient";
pub const DASHBOARD: &str = "Dashboard";
pub const HOSPITAL: &str = "Hospital";

/// Opaque label marking what kind (or instance) of server data an entry holds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityTag(String);

impl EntityTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Collection-level tag, e.g. `Patient`.
    pub fn collection(kind: &str) -> Self {
        Self(kind.to_string())
    }

    /// Instance-level tag, e.g. `Patient:42`.
    pub fn instance(kind: &str, id: impl fmt::Display) -> Self {
        Self(format!("{}:{}", kind, id))
    }

    pub fn patient() -> Self {
        Self::collection(PATIENT)
    }

    pub fn patient_id(id: impl fmt::Display) -> Self {
        Self::instance(PATIENT, id)
    }

    pub fn dashboard() -> Self {
        Self::collection(DASHBOARD)
    }

    pub fn hospital() -> Self {
        Self::collection(HOSPITAL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for EntityTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// Ordered set of tags, as declared by a query or a mutation.
pub type TagSet = BTreeSet<EntityTag>;

/// Build a [`TagSet`] from anything tag-like.
pub fn tags<I, T>(items: I) -> TagSet
where
    I: IntoIterator<Item = T>,
    T: Into<EntityTag>,
{
    items.into_iter().map(Into::into).collect()
}
