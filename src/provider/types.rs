//! Skill data model.

use serde::{Deserialize, Serialize};

/// Identity record for a discoverable skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillInfo {
    /// Unique within its provider.
    pub name: String,
    /// One-line summary.
    pub description: String,
    /// Free-form version string.
    pub version: String,
    /// Name of the provider that published it.
    pub source: String,
    /// Canonical repository URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// One file of a fetched skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillFile {
    /// Path relative to the skill root, slash-separated.
    pub path: String,
    /// Raw file content.
    pub content: String,
}

/// Options for [`Provider::list_with`](super::Provider::list_with).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Skip cache reads. The fresh result is still written to the cache.
    pub bypass_cache: bool,
}

impl ListOptions {
    /// Options that force a network refresh.
    #[must_use]
    pub fn refresh() -> Self {
        Self { bypass_cache: true }
    }
}

/// Where a listing was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOrigin {
    /// The provider's in-memory cache.
    Memory,
    /// The on-disk cache.
    Disk,
    /// A fresh manifest download.
    Network,
}

/// Result of a list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Skills published by the provider.
    pub skills: Vec<SkillInfo>,
    /// Manifest entries dropped for missing fields (only counted on network loads).
    pub skipped: usize,
    /// Where the skills came from.
    pub origin: ListingOrigin,
}
