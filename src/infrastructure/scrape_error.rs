//! Error taxonomy for fetching, parsing and crawling
//!
//! Only a private or forbidden collection and bad configuration abort a run.
//! Everything else degrades the affected page or record and is logged.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("collection at {url} is private or forbidden (HTTP {status})")]
    PrivateOrForbiddenCollection { url: String, status: u16 },

    #[error("failed to fetch collection page {url}: {reason}")]
    PageFetchFailure {
        url: String,
        page: Option<u32>,
        reason: String,
    },

    #[error("secondary fetch failed for {url}: {reason}")]
    SecondaryFetchFailure { url: String, reason: String },

    #[error("unrecognized input shape: {shape}")]
    SchemaNormalizationAmbiguity { shape: String },

    #[error("HTTP request failed: {status} - {url}")]
    HttpStatus { status: u16, url: String },

    #[error("transport error for {url}: {message}")]
    Transport {
        url: String,
        message: String,
        timeout: bool,
    },

    #[error("malformed response body from {url}: {reason}")]
    MalformedBody { url: String, reason: String },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("URL resolution failed: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("crawl cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ScrapeError {
    pub fn page_fetch_failure(url: &str, page: Option<u32>, cause: &ScrapeError) -> Self {
        Self::PageFetchFailure {
            url: url.to_string(),
            page,
            reason: cause.to_string(),
        }
    }

    pub fn secondary_fetch_failure(url: &str, cause: &ScrapeError) -> Self {
        Self::SecondaryFetchFailure {
            url: url.to_string(),
            reason: cause.to_string(),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_url(url: &str, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } | Self::PrivateOrForbiddenCollection { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Worth retrying: timeouts, connection failures, HTTP 429 and 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// Aborts the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PrivateOrForbiddenCollection { .. } | Self::Configuration { .. }
        )
    }

    /// Access-denied status codes on a collection page
    pub fn is_access_denied_status(status: u16) -> bool {
        status == 401 || status == 403
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let server = ScrapeError::HttpStatus { status: 503, url: "u".into() };
        let throttled = ScrapeError::HttpStatus { status: 429, url: "u".into() };
        let missing = ScrapeError::HttpStatus { status: 404, url: "u".into() };
        let timeout = ScrapeError::Transport { url: "u".into(), message: "timed out".into(), timeout: true };

        assert!(server.is_transient());
        assert!(throttled.is_transient());
        assert!(!missing.is_transient());
        assert!(timeout.is_transient());
        assert!(!ScrapeError::Cancelled.is_transient());
    }

    #[test]
    fn test_only_private_and_config_are_fatal() {
        let private = ScrapeError::PrivateOrForbiddenCollection { url: "u".into(), status: 403 };
        assert!(private.is_fatal());
        assert!(ScrapeError::configuration("bad").is_fatal());
        assert!(!ScrapeError::secondary_fetch_failure("u", &ScrapeError::Cancelled).is_fatal());
        assert_eq!(private.status(), Some(403));
    }
}
