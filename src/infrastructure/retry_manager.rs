//! Retry classification and backoff
//!
//! Failures are classified as transient (timeouts, connection errors, 5xx),
//! rate limited (429) or permanent (other 4xx, malformed bodies,
//! cancellation). Only the first two are retried, with exponential backoff
//! bounded by `max_delay`.

use std::time::Duration;

use crate::infrastructure::config::HttpConfig;
use crate::infrastructure::scrape_error::ScrapeError;

/// 에러 분류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClassification {
    Transient {
        retry_after: Duration,
        category: TransientErrorCategory,
    },
    RateLimited {
        retry_after: Duration,
    },
    Permanent {
        reason: String,
        category: PermanentErrorCategory,
    },
}

impl ErrorClassification {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } | Self::RateLimited { retry_after } => Some(*retry_after),
            Self::Permanent { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientErrorCategory {
    Timeout,
    Connection,
    ServerError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermanentErrorCategory {
    AccessDenied,
    NotFound,
    ClientError,
    MalformedResponse,
    Cancelled,
    Other,
}

/// 실패 분류기 트레이트
pub trait FailureClassifier: Send + Sync {
    fn classify_error(&self, error: &ScrapeError, attempt_count: u32) -> ErrorClassification;
    fn calculate_backoff(&self, attempt_count: u32) -> Duration;
    fn should_retry(&self, classification: &ErrorClassification, attempt_count: u32) -> bool;
}

/// Bounded exponential backoff policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms.max(config.retry_base_delay_ms)),
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl FailureClassifier for RetryPolicy {
    fn classify_error(&self, error: &ScrapeError, attempt_count: u32) -> ErrorClassification {
        let backoff = self.calculate_backoff(attempt_count);
        match error {
            ScrapeError::Transport { timeout: true, .. } => ErrorClassification::Transient {
                retry_after: backoff,
                category: TransientErrorCategory::Timeout,
            },
            ScrapeError::Transport { .. } => ErrorClassification::Transient {
                retry_after: backoff,
                category: TransientErrorCategory::Connection,
            },
            ScrapeError::HttpStatus { status: 429, .. } => ErrorClassification::RateLimited {
                retry_after: (backoff * 2).min(self.max_delay),
            },
            ScrapeError::HttpStatus { status, .. } if (500..600).contains(status) => ErrorClassification::Transient {
                retry_after: backoff,
                category: TransientErrorCategory::ServerError,
            },
            ScrapeError::HttpStatus { status, .. } | ScrapeError::PrivateOrForbiddenCollection { status, .. } => {
                let category = match *status {
                    401 | 403 => PermanentErrorCategory::AccessDenied,
                    404 | 410 => PermanentErrorCategory::NotFound,
                    _ => PermanentErrorCategory::ClientError,
                };
                ErrorClassification::Permanent {
                    reason: error.to_string(),
                    category,
                }
            }
            ScrapeError::MalformedBody { .. } => ErrorClassification::Permanent {
                reason: error.to_string(),
                category: PermanentErrorCategory::MalformedResponse,
            },
            ScrapeError::Cancelled => ErrorClassification::Permanent {
                reason: error.to_string(),
                category: PermanentErrorCategory::Cancelled,
            },
            _ => ErrorClassification::Permanent {
                reason: error.to_string(),
                category: PermanentErrorCategory::Other,
            },
        }
    }

    /// `base × 2^(attempt-1)`, capped at `max_delay`
    fn calculate_backoff(&self, attempt_count: u32) -> Duration {
        let exponent = attempt_count.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent).min(self.max_delay)
    }

    fn should_retry(&self, classification: &ErrorClassification, attempt_count: u32) -> bool {
        attempt_count <= self.max_retries && classification.retry_after().is_some()
    }
}
