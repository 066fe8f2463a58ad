//! Per-host request pacing
//!
//! One keyed `governor` limiter is shared by everything in a crawl session.
//! Requests to the same host wait their turn; other hosts are unaffected.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use url::Url;

use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

pub struct HostRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    requests_per_second: u32,
}

impl HostRateLimiter {
    pub fn per_second(requests_per_second: u32) -> ScrapeResult<Self> {
        let rate = NonZeroU32::new(requests_per_second)
            .ok_or_else(|| ScrapeError::configuration("Rate limit must be greater than 0"))?;
        Ok(Self {
            limiter: RateLimiter::keyed(Quota::per_second(rate)),
            requests_per_second,
        })
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }

    /// Limiter key for a URL; unparsable URLs share one bucket
    pub fn host_key(url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|parsed| {
                let host = parsed.host_str()?.to_ascii_lowercase();
                Some(match parsed.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host,
                })
            })
            .unwrap_or_default()
    }

    /// Wait until a request to `url`'s host is allowed
    pub async fn until_ready(&self, url: &str) {
        let key = Self::host_key(url);
        trace!("Waiting for rate limiter slot on '{}'", key);
        self.limiter.until_key_ready(&key).await;
    }

    /// Like `until_ready`, but gives up when the token is cancelled
    pub async fn until_ready_or_cancelled(&self, url: &str, cancel: &CancellationToken) -> ScrapeResult<()> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ScrapeError::Cancelled),
            () = self.until_ready(url) => Ok(()),
        }
    }

    /// Non-blocking check, consuming a slot when one is free
    pub fn try_acquire(&self, url: &str) -> bool {
        self.limiter.check_key(&Self::host_key(url)).is_ok()
    }
}

impl std::fmt::Debug for HostRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .finish_non_exhaustive()
    }
}
