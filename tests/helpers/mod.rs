//! Shared fixtures for the integration tests.
//!
//! Everything talks to a local `wiremock` server; nothing reaches GitHub.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skillpack::cache::{CacheStore, MemoryCache};
use skillpack::http::{FetcherConfig, HttpFetcher, RetryPolicy};
use skillpack::provider::{Endpoints, GitHubProvider, GitHubRepo, MANIFEST_PATH};

pub const OWNER: &str = "acme";
pub const REPO: &str = "skills";
pub const BRANCH: &str = "main";

/// Retry policy with millisecond delays and no jitter.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_jitter: Duration::ZERO,
        ..RetryPolicy::default().with_base_delay(Duration::from_millis(1))
    }
}

/// Fetcher config with fast retries and no token.
pub fn fetcher_config() -> FetcherConfig {
    FetcherConfig {
        timeout: Duration::from_secs(5),
        retry: fast_retry(),
        token: None,
        ..FetcherConfig::default()
    }
}

pub fn fetcher() -> HttpFetcher {
    HttpFetcher::new(fetcher_config()).unwrap()
}

/// A provider for `acme/skills` pointed at `server`.
pub fn provider(server: &MockServer, disk: Arc<dyn CacheStore>) -> GitHubProvider {
    let repo = GitHubRepo::new(OWNER, REPO, BRANCH).unwrap();
    GitHubProvider::new("acme", repo, fetcher(), disk).with_endpoints(Endpoints::single(&server.uri()))
}

/// A provider whose disk layer is an in-memory map.
pub fn provider_without_disk(server: &MockServer) -> GitHubProvider {
    provider(server, Arc::new(MemoryCache::new()))
}

pub fn manifest_path() -> String {
    format!("/{OWNER}/{REPO}/{BRANCH}/{MANIFEST_PATH}")
}

pub fn tree_path() -> String {
    format!("/repos/{OWNER}/{REPO}/git/trees/{BRANCH}")
}

pub fn raw_path(file: &str) -> String {
    format!("/{OWNER}/{REPO}/{BRANCH}/{file}")
}

pub fn entry(name: &str, description: &str) -> Value {
    json!({ "name": name, "description": description, "version": "1.0.0" })
}

/// A manifest with the given plugin entries.
pub fn manifest(plugins: Vec<Value>) -> Value {
    json!({
        "name": "acme-skills",
        "owner": { "name": "Acme" },
        "metadata": { "description": "Acme skills", "version": "1.0.0" },
        "plugins": plugins,
    })
}

/// The catalog most tests use.
pub fn catalog() -> Value {
    manifest(vec![
        entry("pdf", "Read and write PDF documents"),
        entry("docx", "Edit Word documents"),
        entry("xlsx", "Spreadsheet formulas and charts"),
    ])
}

/// Serves `body` as the manifest, expecting exactly `times` requests.
pub async fn mount_manifest(server: &MockServer, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(manifest_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Serves a recursive tree listing `blobs`, expecting exactly `times` requests.
pub async fn mount_tree(server: &MockServer, blobs: &[&str], times: u64) {
    let mut tree: Vec<Value> = blobs
        .iter()
        .map(|p| json!({ "path": p, "type": "blob", "url": format!("https://api.github.com/blob/{p}") }))
        .collect();
    tree.push(json!({ "path": "skills", "type": "tree" }));

    Mock::given(method("GET"))
        .and(path(tree_path()))
        .and(query_param("recursive", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc123",
            "tree": tree,
            "truncated": false,
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Serves `content` at the raw path of `file`, expecting `times` requests.
pub async fn mount_file(server: &MockServer, file: &str, content: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(raw_path(file)))
        .respond_with(ResponseTemplate::new(200).set_body_string(content))
        .expect(times)
        .mount(server)
        .await;
}

/// Number of requests the server has seen.
pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}
