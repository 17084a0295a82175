//! Skill providers.
//!
//! A provider is a named source of skills. Every provider exposes the same
//! capability set through [`Provider`]; the only implementation today is
//! [`GitHubProvider`].
//!
//! # Architecture
//!
//! - **types**: `SkillInfo`, `SkillFile`, listing options and results
//! - **manifest**: `marketplace.json` parsing with per-entry recovery
//! - **search**: substring search with an edit-distance fallback
//! - **github**: the GitHub-backed provider
//!
//! # Usage
//!
//! ```ignore
//! use skillpack::registry;
//!
//! let provider = registry::get_provider(Some("anthropic"))?;
//! for skill in provider.search("pdf").await? {
//!     println!("{} {}", skill.name, skill.version);
//! }
//! let files = provider.fetch("pdf").await?;
//! ```

mod github;
pub mod manifest;
pub mod search;
mod types;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use github::{
    DEFAULT_API_BASE, DEFAULT_BRANCH, DEFAULT_RAW_BASE, Endpoints, GitHubProvider, GitHubRepo,
    MANIFEST_PATH, SKILLS_DIR, TreeEntry, is_safe_relative_path,
};
pub use types::{ListOptions, Listing, ListingOrigin, SkillFile, SkillInfo};

use crate::error::SkillError;

/// Provider implementation selected by a configuration entry's `type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// A GitHub repository.
    #[default]
    GitHub,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GitHub => f.write_str("github"),
        }
    }
}

/// Capabilities every provider offers.
#[async_trait]
pub trait Provider: fmt::Debug + Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    /// Human-readable name.
    fn display_name(&self) -> &str;

    /// Implementation kind.
    fn kind(&self) -> ProviderKind;

    /// Lists skills, reporting where they came from and how many manifest
    /// entries were dropped.
    async fn list_with(&self, options: ListOptions) -> Result<Listing, SkillError>;

    /// All skills published by this provider.
    async fn list(&self) -> Result<Vec<SkillInfo>, SkillError> {
        Ok(self.list_with(ListOptions::default()).await?.skills)
    }

    /// Every file of `skill`, with paths relative to the skill root.
    async fn fetch(&self, skill: &str) -> Result<Vec<SkillFile>, SkillError>;

    /// Skills matching `query`; see [`search::search`].
    async fn search(&self, query: &str) -> Result<Vec<SkillInfo>, SkillError> {
        let skills = self.list().await?;
        Ok(search::search(&skills, query))
    }

    /// The catalog entry for `skill`, if listed.
    async fn info(&self, skill: &str) -> Result<Option<SkillInfo>, SkillError> {
        Ok(self.list().await?.into_iter().find(|s| s.name == skill))
    }

    /// Drops this provider's memory and disk caches.
    fn clear_cache(&self);
}
