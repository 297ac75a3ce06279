//! GitHub API client.

use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use regex::Regex;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{
    ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, RANGE, RETRY_AFTER, USER_AGENT,
};

use crate::error::{RepoUtilsError, Result};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

static NEXT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<([^>]*)>\s*;\s*rel="?next"?"#).expect("valid link regex"));

/// Retry-with-backoff policy applied to every request the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; attempt `n` sleeps `backoff * 2^(n-1)`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Statuses worth retrying: rate limiting and transient server errors.
    pub fn is_transient(status: StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Client for interacting with the GitHub API and raw file hosts.
///
/// The client is immutable once built and cheap to clone; worker threads
/// share one instance. API calls are bounded by a request timeout; file
/// downloads are only bounded at connect time, so large files are not cut off.
#[derive(Clone)]
pub struct GitHubClient {
    pub(crate) base_url: String,
    pub(crate) client: Client,
    pub(crate) retry: RetryPolicy,
    pub(crate) timeout: Duration,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Create a new GitHub client with the given bearer token.
    pub fn new(token: impl AsRef<str>) -> Result<Self> {
        let token = token.as_ref().trim();
        if token.is_empty() {
            return Err(RepoUtilsError::MissingToken);
        }

        let client = Client::builder()
            .default_headers(Self::headers(token)?)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .build()?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            client,
            retry: RetryPolicy::default(),
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Create a client using the GITHUB_TOKEN environment variable.
    ///
    /// GITHUB_API_URL, when set, replaces the public API base URL.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN").map_err(|_| RepoUtilsError::MissingToken)?;
        let client = Self::new(token)?;
        match std::env::var("GITHUB_API_URL") {
            Ok(url) if !url.trim().is_empty() => Ok(client.with_base_url(url)),
            _ => Ok(client),
        }
    }

    /// Point the client at a different API root (GitHub Enterprise, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut url = base_url.into();
        while url.ends_with('/') {
            url.pop();
        }
        self.base_url = url;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the timeout applied to API calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn headers(token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            RepoUtilsError::InvalidConfig("GITHUB_TOKEN contains invalid characters".into())
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("repo-utils"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));
        Ok(headers)
    }

    /// Resolve an endpoint against the base URL. Absolute URLs pass through.
    pub(crate) fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}{}", self.base_url, endpoint)
        }
    }

    pub(crate) fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(endpoint))
            .timeout(self.timeout)
    }

    /// GET a file without the API request timeout.
    fn download(&self, url: &str) -> RequestBuilder {
        self.client.get(self.url(url))
    }

    /// Send a request, retrying connection failures and transient statuses.
    ///
    /// When retries run out on a transient status the last response is
    /// returned so the caller can report it.
    pub(crate) fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let Some(this_try) = request.try_clone() else {
                return Ok(request.send()?);
            };

            let retries_left = attempt < self.retry.max_retries;
            attempt += 1;
            let mut delay = self.retry.delay(attempt);

            match this_try.send() {
                Ok(response) => {
                    let status = response.status();
                    if !RetryPolicy::is_transient(status) || !retries_left {
                        return Ok(response);
                    }
                    if let Some(wait) = retry_after(&response) {
                        delay = wait.min(MAX_RETRY_AFTER);
                    }
                    tracing::warn!(
                        url = %response.url(),
                        %status,
                        attempt,
                        ?delay,
                        "transient response, retrying"
                    );
                }
                Err(e) if retries_left && (e.is_connect() || e.is_timeout()) => {
                    tracing::warn!(error = %e, attempt, ?delay, "request failed, retrying");
                }
                Err(e) => return Err(e.into()),
            }

            thread::sleep(delay);
        }
    }

    /// Turn a non-success response into a [`RepoUtilsError::Status`].
    pub(crate) fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().unwrap_or_default();
        Err(RepoUtilsError::Status { status, url, body })
    }

    /// GET every page of a Link-paginated listing.
    pub(crate) fn get_paginated<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(self.url(endpoint));

        while let Some(url) = next {
            let response = Self::check(self.execute(self.request(Method::GET, &url))?)?;
            next = next_link(response.headers());
            let page: Vec<T> = response.json().map_err(|e| RepoUtilsError::GitHub {
                message: format!("Failed to parse page {}: {}", url, e),
            })?;
            items.extend(page);
        }

        Ok(items)
    }

    /// Make a POST request to the GitHub API.
    pub(crate) fn post<T: serde::de::DeserializeOwned, B: serde::Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.request(Method::POST, endpoint).json(body);
        let response = Self::check(self.execute(request)?)?;
        response.json().map_err(|e| RepoUtilsError::GitHub {
            message: format!("Failed to parse response: {}", e),
        })
    }

    /// Make a PATCH request to the GitHub API.
    pub(crate) fn patch<T: serde::de::DeserializeOwned, B: serde::Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.request(Method::PATCH, endpoint).json(body);
        let response = Self::check(self.execute(request)?)?;
        response.json().map_err(|e| RepoUtilsError::GitHub {
            message: format!("Failed to parse response: {}", e),
        })
    }

    /// Download a file as text.
    pub fn get_text(&self, url: &str) -> Result<String> {
        let response = Self::check(self.execute(self.download(url))?)?;
        Ok(response.text()?)
    }

    /// Fetch the last `len` bytes of a file with a suffix range request.
    ///
    /// Servers that ignore `Range` send the whole body; the tail of it is
    /// returned in that case.
    pub fn get_tail(&self, url: &str, len: u64) -> Result<Vec<u8>> {
        let request = self.download(url).header(RANGE, format!("bytes=-{}", len));
        let response = Self::check(self.execute(request)?)?;
        let partial = response.status() == StatusCode::PARTIAL_CONTENT;
        let bytes = response.bytes()?.to_vec();

        if partial {
            return Ok(bytes);
        }
        let start = bytes.len().saturating_sub(len as usize);
        Ok(bytes[start..].to_vec())
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Extract the `rel="next"` target from a Link header.
pub(crate) fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| NEXT_LINK.captures(value).map(|c| c[1].to_string()))
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
