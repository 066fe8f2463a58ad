//! Crawl session: the shared fetch path for one run
//!
//! Every request of a run goes through `CrawlSession::get`, which waits on the
//! per-host rate limiter, retries transient failures with backoff, and stops
//! issuing requests once the session's cancellation token fires.

#![allow(clippy::uninlined_format_args)]

use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_client::{FetchResponse, Fetcher};
use crate::infrastructure::rate_limiter::HostRateLimiter;
use crate::infrastructure::retry_manager::{FailureClassifier, RetryPolicy};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// Request counters for one session
#[derive(Debug, Default)]
struct SessionCounters {
    requests: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub requests: u64,
    pub retries: u64,
    pub failures: u64,
}

pub struct CrawlSession {
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<HostRateLimiter>,
    retry: Arc<dyn FailureClassifier>,
    headers: HeaderMap,
    cancel: CancellationToken,
    counters: SessionCounters,
}

impl CrawlSession {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        limiter: Arc<HostRateLimiter>,
        retry: Arc<dyn FailureClassifier>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            retry,
            headers: HeaderMap::new(),
            cancel,
            counters: SessionCounters::default(),
        }
    }

    pub fn from_config(config: &AppConfig, fetcher: Arc<dyn Fetcher>, cancel: CancellationToken) -> ScrapeResult<Self> {
        let limiter = Arc::new(HostRateLimiter::per_second(config.http.max_requests_per_second)?);
        let retry: Arc<dyn FailureClassifier> = Arc::new(RetryPolicy::from_config(&config.http));
        Ok(Self::new(fetcher, limiter, retry, cancel))
    }

    /// Extra headers sent with every request
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the session once `deadline` elapses
    pub fn cancel_after(&self, deadline: Duration) -> JoinHandle<()> {
        let token = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(deadline) => {
                    warn!("⏰ Crawl deadline of {:?} reached, cancelling", deadline);
                    token.cancel();
                }
                () = token.cancelled() => {}
            }
        })
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// GET `url`, returning only successful responses.
    ///
    /// Non-2xx statuses surface as `ScrapeError::HttpStatus` after retries
    /// are exhausted, so callers can map them to their own failure kinds.
    pub async fn get(&self, url: &str) -> ScrapeResult<FetchResponse> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            self.limiter.until_ready_or_cancelled(url, &self.cancel).await?;
            self.counters.requests.fetch_add(1, Ordering::Relaxed);

            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    warn!("🛑 HTTP request cancelled for URL: {}", url);
                    return Err(ScrapeError::Cancelled);
                }
                result = self.fetcher.fetch(url, &self.headers) => result,
            };

            let error = match result {
                Ok(response) if response.is_success() => {
                    debug!("Successfully fetched: {} ({})", url, response.status);
                    return Ok(response);
                }
                Ok(response) => ScrapeError::HttpStatus {
                    status: response.status,
                    url: url.to_string(),
                },
                Err(error) => error,
            };

            let classification = self.retry.classify_error(&error, attempt);
            if !self.retry.should_retry(&classification, attempt) {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                debug!("Giving up on {} after {} attempt(s): {}", url, attempt, error);
                return Err(error);
            }

            let delay = classification.retry_after().unwrap_or_default();
            self.counters.retries.fetch_add(1, Ordering::Relaxed);
            info!("🔄 Retrying {} in {:?} (attempt {} failed: {})", url, delay, attempt, error);

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(ScrapeError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
