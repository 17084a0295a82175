//! Slug validation for owner, repository, branch and skill names.
//!
//! Every identifier that ends up in a URL or a tree path goes through
//! [`validate`] first, so malformed input never reaches network code.

use std::fmt;

use thiserror::Error;

/// Maximum slug length accepted.
pub const MAX_SLUG_LEN: usize = 100;

/// Characters allowed between alphanumerics.
const SEPARATORS: [char; 3] = ['.', '_', '-'];

/// What a slug identifies, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugKind {
    /// Repository owner (user or organization).
    Owner,
    /// Repository name.
    Repo,
    /// Branch name.
    Branch,
    /// Skill name.
    Skill,
}

impl fmt::Display for SlugKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Owner => "owner",
            Self::Repo => "repository",
            Self::Branch => "branch",
            Self::Skill => "skill name",
        };
        f.write_str(label)
    }
}

/// A slug that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}': {reason}")]
pub struct ValidationError {
    /// Which identifier was rejected.
    pub kind: SlugKind,
    /// The rejected input.
    pub value: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl ValidationError {
    fn new(kind: SlugKind, value: &str, reason: &'static str) -> Self {
        Self {
            kind,
            value: value.to_string(),
            reason,
        }
    }
}

/// Validates a slug: ASCII letters, digits, `.`, `_` and `-`, not starting or
/// ending with a separator.
pub fn validate(kind: SlugKind, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(kind, value, "must not be empty"));
    }
    if value.len() > MAX_SLUG_LEN {
        return Err(ValidationError::new(kind, value, "is too long"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !SEPARATORS.contains(c))
    {
        let reason = if bad == '/' {
            "must not contain '/'"
        } else {
            "may only contain letters, digits, '.', '_' and '-'"
        };
        return Err(ValidationError::new(kind, value, reason));
    }
    if value.starts_with(SEPARATORS) || value.ends_with(SEPARATORS) {
        return Err(ValidationError::new(
            kind,
            value,
            "must not start or end with '.', '_' or '-'",
        ));
    }
    Ok(())
}

/// Returns true if `value` is a valid slug.
#[must_use]
pub fn is_valid(value: &str) -> bool {
    validate(SlugKind::Skill, value).is_ok()
}
