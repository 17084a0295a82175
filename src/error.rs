//! Errors surfaced by providers and the registry.

use thiserror::Error;

use crate::config::ConfigError;
use crate::http::FetchError;
use crate::slug::ValidationError;

/// Top-level error for provider and registry operations.
#[derive(Debug, Error)]
pub enum SkillError {
    /// A slug was rejected before any I/O.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A network operation failed; `context` names what was being fetched.
    #[error("{context}: {source}")]
    Fetch {
        context: String,
        #[source]
        source: FetchError,
    },

    /// A response body was not the JSON we expected.
    #[error("{context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The manifest parsed but lacks a usable `plugins` array.
    #[error("invalid manifest from provider '{provider}': {reason}")]
    InvalidManifest { provider: String, reason: String },

    /// The provider has no files under `skills/<skill>/`.
    #[error("skill '{skill}' not found in provider '{provider}'")]
    SkillNotFound { skill: String, provider: String },

    /// No configured or ad-hoc provider matches the name.
    #[error("provider '{name}' not found")]
    ProviderNotFound { name: String },

    /// A provider URL is not an `owner/repo` reference.
    #[error("invalid repository reference '{url}': expected owner/repo")]
    InvalidRepoRef { url: String },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SkillError {
    /// Wraps a fetch error with context.
    pub fn fetch(context: impl Into<String>, source: FetchError) -> Self {
        Self::Fetch {
            context: context.into(),
            source,
        }
    }

    /// Wraps a JSON error with context.
    pub fn parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            context: context.into(),
            source,
        }
    }

    /// HTTP status of the underlying failure, if there is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns true if the failure is GitHub rate limiting.
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::Fetch { source, .. } if source.is_rate_limit())
    }

    /// A remediation hint for the common failures.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Validation(_) | Self::InvalidRepoRef { .. } => Some(
                "Names may only use letters, digits, '.', '_' and '-', and must not start or end with a separator.",
            ),
            Self::ProviderNotFound { .. } => Some(
                "Add the provider to ~/.skillpack/config.toml, or pass a GitHub repository as owner/repo.",
            ),
            Self::SkillNotFound { .. } => {
                Some("Run `skills search <query>` to see the skills this provider publishes.")
            }
            Self::Fetch { source, .. } if source.is_rate_limit() => Some(
                "Set SKILLPACK_GITHUB_TOKEN or GITHUB_TOKEN to a GitHub token to raise the rate limit.",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slug::{self, SlugKind};
    use std::error::Error as _;

    #[test]
    fn test_fetch_error_keeps_source() {
        let err = SkillError::fetch(
            "fetching manifest for provider 'anthropic'",
            FetchError::Http {
                status: 404,
                url: "https://example.com".to_string(),
            },
        );
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().starts_with("fetching manifest"));
        assert!(err.source().is_some());
        assert!(err.hint().is_none());
    }

    #[test]
    fn test_rate_limit_hint() {
        let err = SkillError::fetch(
            "listing",
            FetchError::RateLimit {
                url: "https://api.github.com".to_string(),
                reset_at: None,
            },
        );
        assert!(err.is_rate_limit());
        assert_eq!(err.status(), Some(403));
        assert!(err.hint().unwrap().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn test_validation_converts() {
        let err: SkillError = slug::validate(SlugKind::Skill, "../x").unwrap_err().into();
        assert!(matches!(err, SkillError::Validation(_)));
        assert!(err.hint().is_some());
    }
}
