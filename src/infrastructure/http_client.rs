//! HTTP fetch capability
//!
//! The crawler and enricher only see the `Fetcher` trait: one GET returning a
//! status code and a body. `HttpClient` is the reqwest implementation; tests
//! substitute in-memory fetchers. Rate limiting, retries and cancellation live
//! in the crawl session wrapped around a fetcher, not in the fetcher itself.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::infrastructure::config::HttpConfig;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single GET against a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> ScrapeResult<FetchResponse>;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: &HttpConfig) -> ScrapeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ScrapeError::configuration(format!("Invalid user agent: {e}")))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| ScrapeError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn transport_error(url: &str, error: &reqwest::Error) -> ScrapeError {
        ScrapeError::Transport {
            url: url.to_string(),
            message: error.to_string(),
            timeout: error.is_timeout(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> ScrapeResult<FetchResponse> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| Self::transport_error(url, &e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_decode() || e.is_body() {
                ScrapeError::MalformedBody {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            } else {
                Self::transport_error(url, &e)
            }
        })?;

        debug!("Fetched {} ({}, {} bytes)", url, status, body.len());
        Ok(FetchResponse { status, body })
    }
}
