//! Infrastructure layer: HTTP, parsing, crawling and output
//!
//! Everything that touches the network, the filesystem or HTML lives here.
//! The crawl session owns the rate limiter, retry policy and cancellation
//! token, and is shared by the pagination crawler and the enrichment fetcher.

pub mod config;
pub mod crawl_session;
pub mod crawling;
pub mod enrichment;
pub mod export;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod rate_limiter;
pub mod retry_manager;
pub mod scrape_error;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError};
pub use crawl_session::{CrawlSession, SessionStats};
pub use crawling::PaginationCrawler;
pub use enrichment::{EnrichmentFetcher, SecondaryKind};
pub use export::{ExportError, OutputFormat};
pub use http_client::{FetchResponse, Fetcher, HttpClient};
pub use logging::init_logging;
pub use parsing::{CollectionPageParser, HistogramParser, ParseContext, ParsingConfig, RuleSet};
pub use rate_limiter::HostRateLimiter;
pub use retry_manager::{FailureClassifier, RetryPolicy};
pub use scrape_error::{ScrapeError, ScrapeResult};
