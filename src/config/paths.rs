//! Well-known locations.

use std::path::PathBuf;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "SKILLPACK_CONFIG";

/// Returns the skillpack data directory (`~/.skillpack`).
#[must_use]
pub fn skillpack_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".skillpack"))
}

/// Returns the config file path, honoring `SKILLPACK_CONFIG`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => Some(PathBuf::from(path)),
        _ => skillpack_dir().map(|d| d.join("config.toml")),
    }
}

/// Returns the log directory (`~/.skillpack/logs`).
#[must_use]
pub fn log_dir() -> PathBuf {
    skillpack_dir()
        .unwrap_or_else(|| PathBuf::from(".skillpack"))
        .join("logs")
}
