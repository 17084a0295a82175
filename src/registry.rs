//! Provider registry.
//!
//! Resolves a provider name to a [`Provider`]. Configured providers are
//! constructed at most once and reused; an unconfigured `owner/repo` name is
//! built on the fly on every call.
//!
//! The process-wide registry behind [`get_provider`], [`get_providers`] and
//! [`clear_provider_cache`] is created from [`Config::load`] on first use and
//! lives until exit. [`clear_provider_cache`] empties its instance map; nothing
//! else resets it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, info};

use crate::cache::{CacheStore, DiskCache};
use crate::config::{Config, ProviderEntry};
use crate::error::SkillError;
use crate::http::HttpFetcher;
use crate::provider::{
    DEFAULT_BRANCH, Endpoints, GitHubProvider, GitHubRepo, Provider, ProviderKind,
};

/// Resolves and memoizes providers.
pub struct ProviderRegistry {
    config: Config,
    fetcher: HttpFetcher,
    disk: Arc<dyn CacheStore>,
    endpoints: Endpoints,
    instances: Mutex<HashMap<String, Arc<dyn Provider>>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("default_provider", &self.config.default_provider)
            .field("providers", &self.config.providers.len())
            .field("cached", &self.cached_count())
            .finish_non_exhaustive()
    }
}

impl ProviderRegistry {
    /// Builds a registry from configuration: fetcher from `[http]`, disk cache
    /// from `[cache]`.
    pub fn from_config(config: Config) -> Result<Self, SkillError> {
        let fetcher = HttpFetcher::new(config.http.fetcher_config())
            .map_err(|e| SkillError::fetch("initializing HTTP client", e))?;
        let disk: Arc<dyn CacheStore> = Arc::new(DiskCache::new(config.cache.dir()));
        Ok(Self::new(config, fetcher, disk))
    }

    /// Builds a registry from explicit parts.
    #[must_use]
    pub fn new(config: Config, fetcher: HttpFetcher, disk: Arc<dyn CacheStore>) -> Self {
        Self {
            config,
            fetcher,
            disk,
            endpoints: Endpoints::default(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Points every provider built from now on at other hosts.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolves `name`, or the default provider when `None`.
    ///
    /// Configured names are memoized. An unconfigured name containing `/` is
    /// treated as an ad-hoc `owner/repo` provider and built fresh.
    pub fn get_provider(&self, name: Option<&str>) -> Result<Arc<dyn Provider>, SkillError> {
        let name = name.unwrap_or(&self.config.default_provider);

        if let Some(entry) = self.config.provider(name) {
            return self.memoized(entry);
        }

        if name.contains('/') {
            debug!("[REGISTRY] Building ad-hoc provider '{}'", name);
            let repo = GitHubRepo::parse(name, None)?;
            return Ok(Arc::new(self.github(name, repo, None)));
        }

        Err(SkillError::ProviderNotFound {
            name: name.to_string(),
        })
    }

    /// Every enabled configured provider when `name` is `None`; otherwise the
    /// single provider `name` resolves to.
    pub fn get_providers(&self, name: Option<&str>) -> Result<Vec<Arc<dyn Provider>>, SkillError> {
        match name {
            Some(name) => Ok(vec![self.get_provider(Some(name))?]),
            None => self
                .config
                .providers
                .iter()
                .filter(|entry| entry.enabled)
                .map(|entry| self.memoized(entry))
                .collect(),
        }
    }

    /// Forgets every memoized provider. Their caches go with them.
    pub fn clear_provider_cache(&self) {
        if let Ok(mut instances) = self.instances.lock() {
            info!("[REGISTRY] Dropping {} cached provider(s)", instances.len());
            instances.clear();
        }
    }

    /// Number of memoized providers.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.instances.lock().map(|i| i.len()).unwrap_or(0)
    }

    fn memoized(&self, entry: &ProviderEntry) -> Result<Arc<dyn Provider>, SkillError> {
        if let Some(existing) = self
            .instances
            .lock()
            .ok()
            .and_then(|instances| instances.get(&entry.name).cloned())
        {
            return Ok(existing);
        }

        let provider = self.construct(entry)?;
        if let Ok(mut instances) = self.instances.lock() {
            // A racing caller may have inserted first; keep theirs.
            let shared = instances
                .entry(entry.name.clone())
                .or_insert_with(|| Arc::clone(&provider));
            return Ok(Arc::clone(shared));
        }
        Ok(provider)
    }

    fn construct(&self, entry: &ProviderEntry) -> Result<Arc<dyn Provider>, SkillError> {
        debug!(
            "[REGISTRY] Constructing {} provider '{}' ({})",
            entry.kind, entry.name, entry.url
        );
        match entry.kind {
            ProviderKind::GitHub => {
                let branch = entry.branch.as_deref().unwrap_or(DEFAULT_BRANCH);
                let repo = GitHubRepo::parse(&entry.url, Some(branch))?;
                Ok(Arc::new(self.github(
                    &entry.name,
                    repo,
                    entry.display_name.as_deref(),
                )))
            }
        }
    }

    fn github(&self, name: &str, repo: GitHubRepo, display_name: Option<&str>) -> GitHubProvider {
        GitHubProvider::new(name, repo, self.fetcher.clone(), Arc::clone(&self.disk))
            .with_display_name(display_name.unwrap_or(name))
            .with_endpoints(self.endpoints.clone())
            .with_concurrency(self.config.http.concurrency)
    }
}

static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();

/// Installs `registry` as the process-wide registry.
///
/// Fails (returning the registry) if one is already installed.
pub fn install(registry: ProviderRegistry) -> Result<(), ProviderRegistry> {
    GLOBAL.set(registry)
}

/// The process-wide registry, built from [`Config::load`] on first use.
pub fn global() -> Result<&'static ProviderRegistry, SkillError> {
    if let Some(registry) = GLOBAL.get() {
        return Ok(registry);
    }
    let registry = ProviderRegistry::from_config(Config::load()?)?;
    Ok(GLOBAL.get_or_init(|| registry))
}

/// [`ProviderRegistry::get_provider`] on the process-wide registry.
pub fn get_provider(name: Option<&str>) -> Result<Arc<dyn Provider>, SkillError> {
    global()?.get_provider(name)
}

/// [`ProviderRegistry::get_providers`] on the process-wide registry.
pub fn get_providers(name: Option<&str>) -> Result<Vec<Arc<dyn Provider>>, SkillError> {
    global()?.get_providers(name)
}

/// [`ProviderRegistry::clear_provider_cache`] on the process-wide registry.
/// A no-op if the registry was never used.
pub fn clear_provider_cache() {
    if let Some(registry) = GLOBAL.get() {
        registry.clear_provider_cache();
    }
}
