//! Skillpack
//!
//! Core of a skill-bundle package manager: discovers, searches and
//! downloads skill bundles published in GitHub repositories.
//!
//! # Architecture
//!
//! - **HTTP Module**: Resilient fetcher with retry, backoff and rate-limit detection
//! - **Cache Module**: Key/value stores in memory and on disk
//! - **Parallel Module**: Bounded, order-preserving async map
//! - **Provider Module**: Provider capability trait and the GitHub provider
//! - **Registry Module**: Name resolution and provider memoization
//!
//! # Usage
//!
//! ```no_run
//! use skillpack::Provider;
//!
//! # async fn run() -> Result<(), skillpack::SkillError> {
//! let provider = skillpack::registry::get_provider(None)?;
//! for skill in provider.list().await? {
//!     println!("{} - {}", skill.name, skill.description);
//! }
//! # Ok(())
//! # }
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod parallel;
pub mod provider;
pub mod registry;
pub mod slug;

// Re-export main types
pub use cache::{CacheStore, CacheStoreExt, DiskCache, MemoryCache};
pub use config::Config;
pub use error::SkillError;
pub use http::{FetchError, FetcherConfig, HttpFetcher, RetryPolicy};
pub use provider::{GitHubProvider, Provider, SkillFile, SkillInfo};
pub use registry::ProviderRegistry;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
