//! Key/value cache layers.
//!
//! Two implementations sit behind [`CacheStore`]: [`MemoryCache`] for the
//! lifetime of a provider and [`DiskCache`] for one JSON file per key under
//! the application cache directory. Entries never expire; they are replaced on
//! refresh and removed only by [`CacheStore::clear`].
//!
//! Reads never fail: a missing or unreadable entry is a miss. Writes return a
//! `Result`, and callers that treat the cache as an optimization route them
//! through [`best_effort`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Application directory name under the platform cache directory.
pub const CACHE_DIR_NAME: &str = "skillpack";

/// Errors from cache writes and clears.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Value could not be serialized.
    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A JSON value store addressed by string keys.
pub trait CacheStore: Send + Sync {
    /// Returns the stored value, or `None` on any miss or read failure.
    fn read_value(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn write_value(&self, key: &str, value: Value) -> Result<(), CacheError>;

    /// Removes the entry for `key`. Clearing a missing key succeeds.
    fn clear(&self, key: &str) -> Result<(), CacheError>;
}

/// Typed access on top of any [`CacheStore`].
pub trait CacheStoreExt: CacheStore {
    /// Reads and deserializes; a value of the wrong shape is a miss.
    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read_value(key)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("[CACHE] Ignoring malformed entry '{}': {}", key, e);
                None
            }
        }
    }

    /// Serializes and writes.
    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.write_value(key, serde_json::to_value(value)?)
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}

/// Logs and discards a cache failure.
pub fn best_effort(result: Result<(), CacheError>, action: &str, key: &str) {
    if let Err(e) = result {
        warn!("[CACHE] {} '{}' failed (ignored): {}", action, key, e);
    }
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn read_value(&self, key: &str) -> Option<Value> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn write_value(&self, key: &str, value: Value) -> Result<(), CacheError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), CacheError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
        Ok(())
    }
}

/// One JSON file per key in a directory.
///
/// No locking: concurrent writers race and the last write wins.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Creates a cache rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache rooted at the platform cache directory (`~/.cache/skillpack` on Linux).
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(default_cache_dir())
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

impl CacheStore for DiskCache {
    fn read_value(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(value) => {
                debug!("[CACHE] Hit {}", path.display());
                Some(value)
            }
            Err(e) => {
                debug!("[CACHE] Malformed {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_value(&self, key: &str, value: Value) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(key);
        let content = serde_json::to_string(&value)?;
        fs::write(&path, content).map_err(|source| CacheError::Io { path, source })
    }

    fn clear(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}

/// Platform cache directory for the application.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CACHE_DIR_NAME)
}

/// Maps a key onto a safe file stem.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
