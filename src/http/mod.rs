//! Resilient HTTP fetcher.
//!
//! Wraps `reqwest` with a per-attempt timeout, manual redirect following,
//! retry with exponential backoff and GitHub rate-limit detection.

mod retry;

pub use retry::{
    AttemptState, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_JITTER,
    DEFAULT_MAX_RETRIES, RETRYABLE_STATUSES, RetryPolicy,
};

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LOCATION};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Default number of redirect hops followed.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Environment variables consulted for an auth token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["SKILLPACK_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// Hosts that receive the `Authorization` header when a token is set.
pub const DEFAULT_AUTH_HOSTS: [&str; 3] =
    ["github.com", "api.github.com", "raw.githubusercontent.com"];

/// Redirect statuses that are followed.
const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Transport failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The peer refused the connection.
    ConnectionRefused,
    /// DNS lookup failed.
    NameNotResolved,
    /// The connection was reset mid-flight.
    ConnectionReset,
    /// Could not connect for another reason.
    Connect,
    /// Anything else (TLS, protocol, body decoding).
    Other,
}

impl TransportKind {
    /// Returns true if this failure is worth retrying.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Other)
    }

    fn classify(err: &reqwest::Error) -> Self {
        let mut source: Option<&(dyn StdError + 'static)> = err.source();
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                match io_err.kind() {
                    io::ErrorKind::ConnectionRefused => return Self::ConnectionRefused,
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                        return Self::ConnectionReset;
                    }
                    _ => {}
                }
            }
            if cause.to_string().to_lowercase().contains("dns") {
                return Self::NameNotResolved;
            }
            source = cause.source();
        }
        if err.is_connect() {
            Self::Connect
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ConnectionRefused => "connection refused",
            Self::NameNotResolved => "name not resolved",
            Self::ConnectionReset => "connection reset",
            Self::Connect => "connection failed",
            Self::Other => "transport error",
        };
        f.write_str(label)
    }
}

/// Errors produced by [`HttpFetcher`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx response that was not retried, or the last one after retries.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// GitHub reported an exhausted rate limit (HTTP 403).
    #[error(
        "GitHub rate limit exceeded for {url}{}; set SKILLPACK_GITHUB_TOKEN or GITHUB_TOKEN to raise the limit",
        reset_suffix(.reset_at)
    )]
    RateLimit {
        url: String,
        reset_at: Option<DateTime<Utc>>,
    },

    /// A single attempt exceeded its deadline.
    #[error("request to {url} timed out after {}ms", .timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    /// More redirect hops than allowed.
    #[error("too many redirects (more than {max}) starting from {url}")]
    TooManyRedirects { url: String, max: usize },

    /// Connection-level failure.
    #[error("{kind} while requesting {url}")]
    Transport {
        url: String,
        kind: TransportKind,
        #[source]
        source: reqwest::Error,
    },

    /// The URL (or a redirect target) could not be parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The underlying client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    reset_at
        .map(|at| format!(" (resets at {})", at.format("%Y-%m-%d %H:%M:%S UTC")))
        .unwrap_or_default()
}

impl FetchError {
    /// HTTP status associated with this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RateLimit { .. } => Some(403),
            _ => None,
        }
    }

    /// Returns true if the fetcher retries this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => RetryPolicy::is_retryable_status(*status),
            Self::Timeout { .. } => true,
            Self::Transport { kind, .. } => kind.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if this is a rate-limit error.
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }

    fn from_reqwest(url: &Url, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                url: url.to_string(),
                timeout,
            };
        }
        Self::Transport {
            url: url.to_string(),
            kind: TransportKind::classify(&err),
            source: err,
        }
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status (always 2xx).
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body decoded as text.
    pub body: String,
}

impl FetchResponse {
    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Per-attempt timeout covering connect and read.
    pub timeout: Duration,
    /// Redirect hops followed before failing.
    pub max_redirects: usize,
    /// Retry schedule.
    pub retry: RetryPolicy,
    /// `User-Agent` sent on every request.
    pub user_agent: String,
    /// Bearer token for the auth hosts.
    pub token: Option<String>,
    /// Hosts (and their subdomains) that receive the token.
    pub auth_hosts: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            retry: RetryPolicy::default(),
            user_agent: format!("skillpack/{}", env!("CARGO_PKG_VERSION")),
            token: token_from_env(),
            auth_hosts: DEFAULT_AUTH_HOSTS.iter().map(|h| (*h).to_string()).collect(),
        }
    }
}

impl FetcherConfig {
    /// Returns true if requests to `url` should carry the token.
    #[must_use]
    pub fn wants_auth(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.auth_hosts
            .iter()
            .any(|h| host == h || host.ends_with(&format!(".{h}")))
    }
}

/// Reads the auth token from the environment, ignoring empty values.
#[must_use]
pub fn token_from_env() -> Option<String> {
    TOKEN_ENV_VARS.iter().find_map(|var| {
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// HTTP GET with timeout, redirects, retries and rate-limit detection.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: Arc<FetcherConfig>,
}

impl HttpFetcher {
    /// Creates a fetcher. Redirects are handled here, not by `reqwest`.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// GETs `url` with the configured timeout.
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.fetch_with(url, None, self.config.timeout).await
    }

    /// GETs `url` sending the given `Accept` header.
    pub async fn fetch_accepting(
        &self,
        url: &str,
        accept: &str,
    ) -> Result<FetchResponse, FetchError> {
        self.fetch_with(url, Some(accept), self.config.timeout).await
    }

    /// GETs `url` with an explicit timeout, retrying transient failures.
    pub async fn fetch_with(
        &self,
        url: &str,
        accept: Option<&str>,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut state = AttemptState::Attempting { attempt: 0 };
        loop {
            state = match state {
                AttemptState::Attempting { attempt } => {
                    let outcome = self.attempt(&parsed, accept, timeout).await;
                    self.config
                        .retry
                        .transition(attempt, outcome, FetchError::is_retryable)
                }
                AttemptState::Retrying {
                    attempt,
                    delay,
                    error,
                } => {
                    warn!(
                        "[HTTP] {} failed ({}), retry {}/{} in {:?}",
                        url, error, attempt, self.config.retry.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                    AttemptState::Attempting { attempt }
                }
                AttemptState::Succeeded(response) => return Ok(response),
                AttemptState::Failed(error) => {
                    debug!("[HTTP] giving up on {}: {}", url, error);
                    return Err(error);
                }
            };
        }
    }

    /// One attempt: a request plus any redirect hops.
    async fn attempt(
        &self,
        start: &Url,
        accept: Option<&str>,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchError> {
        let mut current = start.clone();
        let started = Instant::now();

        for hop in 0..=self.config.max_redirects {
            debug!("[HTTP] GET {} (hop {})", current, hop);

            let response = self
                .request(&current, accept, timeout)
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(&current, timeout, e))?;

            let status = response.status().as_u16();

            if REDIRECT_STATUSES.contains(&status) {
                current = redirect_target(&current, status, response.headers())?;
                continue;
            }

            if response.status().is_success() {
                let headers = response.headers().clone();
                let body = response
                    .text()
                    .await
                    .map_err(|e| FetchError::from_reqwest(&current, timeout, e))?;
                info!(
                    "[HTTP] {} -> {} ({} bytes in {:?})",
                    current,
                    status,
                    body.len(),
                    started.elapsed()
                );
                return Ok(FetchResponse {
                    url: current.to_string(),
                    status,
                    headers,
                    body,
                });
            }

            if status == 403 {
                if let Some(reset_at) = rate_limit_reset(response.headers()) {
                    warn!("[HTTP] rate limit exhausted for {}", current);
                    return Err(FetchError::RateLimit {
                        url: current.to_string(),
                        reset_at,
                    });
                }
            }

            debug!("[HTTP] {} -> {}", current, status);
            return Err(FetchError::Http {
                status,
                url: current.to_string(),
            });
        }

        Err(FetchError::TooManyRedirects {
            url: start.to_string(),
            max: self.config.max_redirects,
        })
    }

    fn request(
        &self,
        url: &Url,
        accept: Option<&str>,
        timeout: Duration,
    ) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url.clone()).timeout(timeout);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(token) = self.config.token.as_deref() {
            if self.config.wants_auth(url) {
                request = request.header(AUTHORIZATION, format!("Bearer {token}"));
            }
        }
        request
    }
}

/// Resolves the `Location` of a redirect response against the current URL.
fn redirect_target(current: &Url, status: u16, headers: &HeaderMap) -> Result<Url, FetchError> {
    let location = headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| FetchError::Http {
            status,
            url: current.to_string(),
        })?;

    current.join(location).map_err(|e| FetchError::InvalidUrl {
        url: location.to_string(),
        reason: e.to_string(),
    })
}

/// Detects a GitHub rate-limit response.
///
/// Returns `Some(reset)` when `x-ratelimit-limit` is present and
/// `x-ratelimit-remaining` is `0`; the inner value is the parsed reset time.
fn rate_limit_reset(headers: &HeaderMap) -> Option<Option<DateTime<Utc>>> {
    header_str(headers, "x-ratelimit-limit")?;
    if header_str(headers, "x-ratelimit-remaining")?.trim() != "0" {
        return None;
    }

    let reset_at = header_str(headers, "x-ratelimit-reset")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));
    Some(reset_at)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
