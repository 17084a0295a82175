//! Configuration loading.
//!
//! Reads `~/.skillpack/config.toml` (or the file named by `SKILLPACK_CONFIG`).
//! A missing file yields the defaults; every section is optional.
//!
//! ```toml
//! default_provider = "anthropic"
//!
//! [[providers]]
//! name = "anthropic"
//! type = "github"
//! url = "anthropics/skills"
//! branch = "main"
//! enabled = true
//!
//! [http]
//! timeout_ms = 15000
//! max_retries = 3
//!
//! [log]
//! level = "info"
//! ```

pub mod paths;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::cache;
use crate::http::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, FetcherConfig, RetryPolicy};
use crate::logging::LogConfig;
use crate::parallel::DEFAULT_CONCURRENCY;
use crate::provider::ProviderKind;

/// Name of the built-in provider.
pub const DEFAULT_PROVIDER_NAME: &str = "anthropic";

/// Repository of the built-in provider.
pub const DEFAULT_PROVIDER_URL: &str = "anthropics/skills";

/// Maximum config file size (256 KB).
const MAX_CONFIG_SIZE: u64 = 256 * 1024;

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML or has the wrong shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but is inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderEntry {
    /// Registry key.
    pub name: String,
    /// Implementation.
    #[serde(rename = "type", default)]
    pub kind: ProviderKind,
    /// Repository reference, `owner/repo` or a GitHub URL.
    pub url: String,
    /// Branch; defaults to `main`.
    #[serde(default)]
    pub branch: Option<String>,
    /// Human-readable name; defaults to `name`.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Disabled providers are skipped by `get_providers(None)`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderEntry {
    /// A GitHub provider entry.
    #[must_use]
    pub fn github(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ProviderKind::GitHub,
            url: url.to_string(),
            branch: None,
            display_name: None,
            enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Redirect hops followed.
    pub max_redirects: usize,
    /// Concurrent file downloads per skill fetch.
    pub concurrency: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: u64::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(15_000),
            max_retries: RetryPolicy::default().max_retries,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl HttpSettings {
    /// Fetcher configuration with these settings and the environment token.
    #[must_use]
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            max_redirects: self.max_redirects,
            retry: RetryPolicy::default().with_max_retries(self.max_retries),
            ..FetcherConfig::default()
        }
    }
}

/// Disk cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache directory; defaults to the platform cache directory.
    pub dir: Option<PathBuf>,
}

impl CacheSettings {
    /// Effective cache directory.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(cache::default_cache_dir)
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider used when none is named.
    pub default_provider: String,
    /// Configured providers.
    pub providers: Vec<ProviderEntry>,
    /// HTTP settings.
    pub http: HttpSettings,
    /// Cache settings.
    pub cache: CacheSettings,
    /// Logging settings.
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: DEFAULT_PROVIDER_NAME.to_string(),
            providers: vec![ProviderEntry::github(DEFAULT_PROVIDER_NAME, DEFAULT_PROVIDER_URL)],
            http: HttpSettings::default(),
            cache: CacheSettings::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Loads from the default location, falling back to defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        match paths::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("[CONFIG] No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Loads and validates a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let size = fs::metadata(path).map_err(io_err)?.len();
        if size > MAX_CONFIG_SIZE {
            return Err(ConfigError::Invalid(format!(
                "{} is larger than {} bytes",
                path.display(),
                MAX_CONFIG_SIZE
            )));
        }

        let content = fs::read_to_string(path).map_err(io_err)?;
        debug!("[CONFIG] Loaded {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks names are unique and the default provider resolves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for entry in &self.providers {
            if entry.name.trim().is_empty() {
                return Err(ConfigError::Invalid("provider name must not be empty".to_string()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider name '{}'",
                    entry.name
                )));
            }
        }

        let default_known = seen.contains(self.default_provider.as_str())
            || self.default_provider.contains('/');
        if !default_known {
            return Err(ConfigError::Invalid(format!(
                "default_provider '{}' is not a configured provider",
                self.default_provider
            )));
        }

        Ok(())
    }

    /// Looks up a provider entry by name.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_provider, DEFAULT_PROVIDER_NAME);
        assert_eq!(config.providers.len(), 1);
        assert!(config.validate().is_ok());
        assert_eq!(config.http.timeout_ms, 15_000);
        assert_eq!(config.http.concurrency, 6);
    }

    #[test]
    fn test_empty_file_is_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml_str(
            r#"
            default_provider = "team"

            [[providers]]
            name = "team"
            type = "github"
            url = "https://github.com/acme/skills"
            branch = "stable"
            display_name = "Acme"

            [[providers]]
            name = "off"
            url = "acme/old-skills"
            enabled = false

            [http]
            timeout_ms = 5000
            max_retries = 1

            [cache]
            dir = "/tmp/skills-cache"

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_provider, "team");
        let team = config.provider("team").unwrap();
        assert_eq!(team.branch.as_deref(), Some("stable"));
        assert_eq!(team.display_name.as_deref(), Some("Acme"));
        assert!(team.enabled);
        assert!(!config.provider("off").unwrap().enabled);
        assert_eq!(config.http.max_retries, 1);
        assert_eq!(config.http.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert_eq!(config.cache.dir(), PathBuf::from("/tmp/skills-cache"));
        assert_eq!(config.log.level, "debug");

        let fetcher = config.http.fetcher_config();
        assert_eq!(fetcher.timeout, Duration::from_millis(5000));
        assert_eq!(fetcher.retry.max_retries, 1);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = Config::from_toml_str(
            r#"
            [[providers]]
            name = "anthropic"
            type = "gitlab"
            url = "a/b"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Config::from_toml_str(
            r#"
            [[providers]]
            name = "anthropic"
            url = "a/b"

            [[providers]]
            name = "anthropic"
            url = "c/d"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_default_rejected() {
        let result = Config::from_toml_str(r#"default_provider = "missing""#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        // An owner/repo default is resolved ad hoc.
        assert!(Config::from_toml_str(r#"default_provider = "acme/skills""#).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[http]").unwrap();
        writeln!(file, "concurrency = 2").unwrap();
        file.flush().unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.http.concurrency, 2);
        assert_eq!(config.default_provider, DEFAULT_PROVIDER_NAME);
    }
}
