//! GitHub-backed provider.
//!
//! A provider is a repository plus branch. The catalog comes from
//! `.claude-plugin/marketplace.json` on the raw content host; skill files are
//! located through the git trees API and downloaded from the raw content host.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::manifest;
use super::types::{ListOptions, Listing, ListingOrigin, SkillFile, SkillInfo};
use super::{Provider, ProviderKind};
use crate::cache::{self, CacheStore, CacheStoreExt, MemoryCache};
use crate::error::SkillError;
use crate::http::{FetchError, HttpFetcher};
use crate::parallel::{self, DEFAULT_CONCURRENCY};
use crate::slug::{self, SlugKind};

/// Default GitHub REST API base.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default raw content base.
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Branch used when none is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// Manifest location inside the repository.
pub const MANIFEST_PATH: &str = ".claude-plugin/marketplace.json";

/// Directory holding one subdirectory per skill.
pub const SKILLS_DIR: &str = "skills";

/// Media type for the trees API.
const GITHUB_JSON: &str = "application/vnd.github+json";

/// Memory cache keys. The memory layer is private to one provider.
const MANIFEST_KEY: &str = "manifest";
const TREE_KEY: &str = "tree";

/// A validated repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
    owner: String,
    repo: String,
    branch: String,
}

impl GitHubRepo {
    /// Validates and builds a reference.
    pub fn new(owner: &str, repo: &str, branch: &str) -> Result<Self, SkillError> {
        slug::validate(SlugKind::Owner, owner)?;
        slug::validate(SlugKind::Repo, repo)?;
        slug::validate(SlugKind::Branch, branch)?;

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
        })
    }

    /// Parses `owner/repo`, `github.com/owner/repo` or
    /// `https://github.com/owner/repo(.git)`.
    pub fn parse(reference: &str, branch: Option<&str>) -> Result<Self, SkillError> {
        let trimmed = reference.trim().trim_end_matches('/');
        let path = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        let path = path.strip_prefix("github.com/").unwrap_or(path);
        let path = path.strip_suffix(".git").unwrap_or(path);

        let Some((owner, repo)) = path.split_once('/') else {
            return Err(SkillError::InvalidRepoRef {
                url: reference.to_string(),
            });
        };
        if repo.contains('/') {
            return Err(SkillError::InvalidRepoRef {
                url: reference.to_string(),
            });
        }

        Self::new(owner, repo, branch.unwrap_or(DEFAULT_BRANCH))
    }

    /// Repository owner.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Branch.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// `owner/repo`.
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Disk cache key: `owner-repo`.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}-{}", self.owner, self.repo)
    }

    /// Repository web URL.
    #[must_use]
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }
}

/// Hosts a provider talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// REST API base, e.g. `https://api.github.com`.
    pub api_base: String,
    /// Raw content base, e.g. `https://raw.githubusercontent.com`.
    pub raw_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            raw_base: DEFAULT_RAW_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Points both bases at one server. Used by tests.
    #[must_use]
    pub fn single(base: &str) -> Self {
        Self {
            api_base: base.to_string(),
            raw_base: base.to_string(),
        }
    }
}

/// One entry of a recursive git tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Path from the repository root.
    pub path: String,
    /// `blob`, `tree` or `commit`.
    #[serde(rename = "type")]
    pub entry_type: String,
    /// API URL of the object.
    #[serde(default)]
    pub url: Option<String>,
}

impl TreeEntry {
    /// Returns true if this entry is a file.
    #[must_use]
    pub fn is_blob(&self) -> bool {
        self.entry_type == "blob"
    }
}

/// Body of `GET /repos/{owner}/{repo}/git/trees/{branch}?recursive=1`.
#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

/// Provider backed by a GitHub repository.
pub struct GitHubProvider {
    name: String,
    display_name: String,
    repo: GitHubRepo,
    endpoints: Endpoints,
    fetcher: HttpFetcher,
    memory: Arc<dyn CacheStore>,
    disk: Arc<dyn CacheStore>,
    concurrency: usize,
}

impl std::fmt::Debug for GitHubProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubProvider")
            .field("name", &self.name)
            .field("repo", &self.repo)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl GitHubProvider {
    /// Creates a provider named `name` for `repo`, persisting manifests to `disk`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        repo: GitHubRepo,
        fetcher: HttpFetcher,
        disk: Arc<dyn CacheStore>,
    ) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            repo,
            endpoints: Endpoints::default(),
            fetcher,
            memory: Arc::new(MemoryCache::new()),
            disk,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets the human-readable name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Overrides the API and raw content hosts.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Sets the number of concurrent file downloads.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Repository reference.
    #[must_use]
    pub fn repo(&self) -> &GitHubRepo {
        &self.repo
    }

    fn raw_url(&self, path: &str) -> Result<String, SkillError> {
        let mut segments = vec![self.repo.owner(), self.repo.repo(), self.repo.branch()];
        segments.extend(path.split('/'));
        build_url(&self.endpoints.raw_base, &segments, None)
    }

    fn tree_url(&self) -> Result<String, SkillError> {
        build_url(
            &self.endpoints.api_base,
            &[
                "repos",
                self.repo.owner(),
                self.repo.repo(),
                "git",
                "trees",
                self.repo.branch(),
            ],
            Some("recursive=1"),
        )
    }

    /// Downloads and parses the manifest.
    async fn load_manifest(&self) -> Result<manifest::ParsedManifest, SkillError> {
        let url = self.raw_url(MANIFEST_PATH)?;
        info!("[PROVIDER] {}: fetching manifest {}", self.name, url);

        let response = self.fetcher.fetch(&url).await.map_err(|e| {
            SkillError::fetch(format!("fetching manifest for provider '{}'", self.name), e)
        })?;
        let document: Value = response.json().map_err(|e| {
            SkillError::parse(format!("parsing manifest for provider '{}'", self.name), e)
        })?;

        manifest::parse(&document, &self.name, Some(&self.repo.html_url())).map_err(|e| {
            SkillError::InvalidManifest {
                provider: self.name.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// Returns the blobs of the repository tree, cached for this provider.
    async fn tree(&self) -> Result<Vec<TreeEntry>, SkillError> {
        if let Some(tree) = self.memory.read::<Vec<TreeEntry>>(TREE_KEY) {
            debug!("[PROVIDER] {}: tree served from memory", self.name);
            return Ok(tree);
        }

        let url = self.tree_url()?;
        let response = self
            .fetcher
            .fetch_accepting(&url, GITHUB_JSON)
            .await
            .map_err(|e| {
                SkillError::fetch(
                    format!("fetching file tree for provider '{}'", self.name),
                    e,
                )
            })?;
        let body: TreeResponse = response.json().map_err(|e| {
            SkillError::parse(format!("parsing file tree for provider '{}'", self.name), e)
        })?;

        if body.truncated {
            warn!(
                "[PROVIDER] {}: tree for {} is truncated, some files may be missing",
                self.name,
                self.repo.slug()
            );
        }

        let blobs: Vec<TreeEntry> = body.tree.into_iter().filter(TreeEntry::is_blob).collect();
        debug!("[PROVIDER] {}: tree has {} blobs", self.name, blobs.len());
        cache::best_effort(self.memory.write(TREE_KEY, &blobs), "write", TREE_KEY);
        Ok(blobs)
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn list_with(&self, options: ListOptions) -> Result<Listing, SkillError> {
        let disk_key = self.repo.cache_key();

        if !options.bypass_cache {
            if let Some(skills) = self.memory.read::<Vec<SkillInfo>>(MANIFEST_KEY) {
                debug!("[PROVIDER] {}: {} skills from memory", self.name, skills.len());
                return Ok(Listing {
                    skills,
                    skipped: 0,
                    origin: ListingOrigin::Memory,
                });
            }
            if let Some(mut skills) = self.disk.read::<Vec<SkillInfo>>(&disk_key) {
                debug!("[PROVIDER] {}: {} skills from disk", self.name, skills.len());
                // The disk key is per repository, so another provider may have written it.
                let repo_url = self.repo.html_url();
                for skill in &mut skills {
                    skill.source.clone_from(&self.name);
                    skill.repo = Some(repo_url.clone());
                }
                cache::best_effort(self.memory.write(MANIFEST_KEY, &skills), "write", MANIFEST_KEY);
                return Ok(Listing {
                    skills,
                    skipped: 0,
                    origin: ListingOrigin::Disk,
                });
            }
        }

        let parsed = self.load_manifest().await?;
        if parsed.skipped > 0 {
            warn!(
                "[PROVIDER] {}: skipped {} manifest entries missing name, description or version",
                self.name, parsed.skipped
            );
        }
        info!("[PROVIDER] {}: {} skills listed", self.name, parsed.skills.len());

        cache::best_effort(self.memory.write(MANIFEST_KEY, &parsed.skills), "write", MANIFEST_KEY);
        cache::best_effort(self.disk.write(&disk_key, &parsed.skills), "write", &disk_key);

        Ok(Listing {
            skills: parsed.skills,
            skipped: parsed.skipped,
            origin: ListingOrigin::Network,
        })
    }

    async fn fetch(&self, skill: &str) -> Result<Vec<SkillFile>, SkillError> {
        slug::validate(SlugKind::Skill, skill)?;

        let prefix = format!("{SKILLS_DIR}/{skill}/");
        let tree = self.tree().await?;
        let matches: Vec<&TreeEntry> = tree
            .iter()
            .filter(|e| e.is_blob() && e.path.starts_with(&prefix))
            .collect();

        if matches.is_empty() {
            return Err(SkillError::SkillNotFound {
                skill: skill.to_string(),
                provider: self.name.clone(),
            });
        }

        let wanted: Vec<(String, String)> = matches
            .into_iter()
            .filter_map(|entry| {
                let relative = &entry.path[prefix.len()..];
                if is_safe_relative_path(relative) {
                    Some((relative.to_string(), entry.path.clone()))
                } else {
                    warn!(
                        "[PROVIDER] {}: dropping unsafe path '{}' in skill '{}'",
                        self.name, entry.path, skill
                    );
                    None
                }
            })
            .collect();

        info!(
            "[PROVIDER] {}: fetching {} files for skill '{}'",
            self.name,
            wanted.len(),
            skill
        );

        parallel::parallel_map(
            wanted,
            |(relative, full_path)| async move {
                let url = self.raw_url(&full_path)?;
                match self.fetcher.fetch(&url).await {
                    Ok(response) => Ok(SkillFile {
                        path: relative,
                        content: response.body,
                    }),
                    Err(e) => Err(SkillError::fetch(
                        format!("fetching '{relative}' of skill '{skill}'"),
                        e,
                    )),
                }
            },
            self.concurrency,
        )
        .await
    }

    fn clear_cache(&self) {
        let disk_key = self.repo.cache_key();
        cache::best_effort(self.memory.clear(MANIFEST_KEY), "clear", MANIFEST_KEY);
        cache::best_effort(self.memory.clear(TREE_KEY), "clear", TREE_KEY);
        cache::best_effort(self.disk.clear(&disk_key), "clear", &disk_key);
        debug!("[PROVIDER] {}: caches cleared", self.name);
    }
}

/// Rejects absolute paths and anything containing `..`.
#[must_use]
pub fn is_safe_relative_path(path: &str) -> bool {
    if path.is_empty() || path.contains("..") {
        return false;
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return false;
    }
    // Windows drive prefix such as `C:`.
    let bytes = path.as_bytes();
    !(bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Appends path segments (percent-encoded) and an optional query to `base`.
fn build_url(base: &str, segments: &[&str], query: Option<&str>) -> Result<String, SkillError> {
    let invalid = |reason: String| {
        SkillError::fetch(
            "building request URL",
            FetchError::InvalidUrl {
                url: base.to_string(),
                reason,
            },
        )
    };

    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("cannot be a base URL".to_string()))?
        .pop_if_empty()
        .extend(segments);
    url.set_query(query);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_parse_forms() {
        for input in [
            "anthropics/skills",
            "github.com/anthropics/skills",
            "https://github.com/anthropics/skills",
            "https://github.com/anthropics/skills.git",
            "https://github.com/anthropics/skills/",
        ] {
            let repo = GitHubRepo::parse(input, None).unwrap();
            assert_eq!(repo.slug(), "anthropics/skills", "input {input}");
            assert_eq!(repo.branch(), DEFAULT_BRANCH);
        }
    }

    #[test]
    fn test_repo_parse_rejects_bad_refs() {
        assert!(matches!(
            GitHubRepo::parse("just-a-name", None),
            Err(SkillError::InvalidRepoRef { .. })
        ));
        assert!(matches!(
            GitHubRepo::parse("a/b/c", None),
            Err(SkillError::InvalidRepoRef { .. })
        ));
        assert!(matches!(
            GitHubRepo::parse("owner/-repo", None),
            Err(SkillError::Validation(_))
        ));
        assert!(matches!(
            GitHubRepo::new("owner", "repo", "bad branch"),
            Err(SkillError::Validation(_))
        ));
    }

    #[test]
    fn test_cache_key() {
        let repo = GitHubRepo::new("anthropics", "skills", "dev").unwrap();
        assert_eq!(repo.cache_key(), "anthropics-skills");
        assert_eq!(repo.html_url(), "https://github.com/anthropics/skills");
    }

    #[test]
    fn test_safe_relative_path() {
        assert!(is_safe_relative_path("SKILL.md"));
        assert!(is_safe_relative_path("scripts/run.py"));
        assert!(!is_safe_relative_path("../escape.md"));
        assert!(!is_safe_relative_path("a/../../b"));
        assert!(!is_safe_relative_path("/etc/passwd"));
        assert!(!is_safe_relative_path("\\windows"));
        assert!(!is_safe_relative_path("C:/x"));
        assert!(!is_safe_relative_path(""));
    }

    #[test]
    fn test_build_url_encodes_segments() {
        let url = build_url(DEFAULT_RAW_BASE, &["o", "r", "main", "skills", "a b.md"], None).unwrap();
        assert_eq!(url, "https://raw.githubusercontent.com/o/r/main/skills/a%20b.md");

        let url = build_url("http://127.0.0.1:9000", &["repos", "o"], Some("recursive=1")).unwrap();
        assert_eq!(url, "http://127.0.0.1:9000/repos/o?recursive=1");
    }

    #[test]
    fn test_tree_entry_kind() {
        let entry: TreeEntry =
            serde_json::from_str(r#"{"path":"skills/pdf","type":"tree"}"#).unwrap();
        assert!(!entry.is_blob());
        assert!(entry.url.is_none());
    }
}
