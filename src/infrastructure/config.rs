//! Configuration infrastructure
//!
//! Configuration is layered with the `config` crate:
//! 1. An optional config file (TOML, JSON or YAML by extension)
//! 2. `LISTSCRAPER__*` environment variables (`__` separates nested keys)
//!
//! Keys missing from both layers take their `Default` values.

#![allow(clippy::uninlined_format_args)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::domain::PageSelection;
use crate::infrastructure::parsing::ParsingConfig;

pub const ENV_PREFIX: &str = "LISTSCRAPER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Validation error: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub crawl: CrawlConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub parsing: ParsingConfig,
}

/// HTTP client, rate limit and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Requests per second allowed against a single host
    pub max_requests_per_second: u32,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// Initial backoff, doubled on every retry
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff
    pub retry_max_delay_ms: u64,

    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            max_retries: defaults::MAX_RETRIES,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: defaults::RETRY_MAX_DELAY_MS,
            follow_redirects: true,
        }
    }
}

/// Crawl behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Items enriched concurrently within one page
    pub enrichment_concurrency: usize,

    /// Pages visited on a diary when none are requested
    pub diary_default_pages: String,

    /// Fetch each diary entry's film page for the director
    pub enrich_diary_entries: bool,

    /// Stop issuing new fetches after this many seconds
    pub deadline_seconds: Option<u64>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            enrichment_concurrency: defaults::ENRICHMENT_CONCURRENCY,
            diary_default_pages: defaults::DIARY_DEFAULT_PAGES.to_string(),
            enrich_diary_entries: false,
            deadline_seconds: None,
        }
    }
}

impl CrawlConfig {
    pub fn diary_default_selection(&self) -> Result<PageSelection, ConfigError> {
        self.diary_default_pages.parse().map_err(|e| ConfigError::Validation {
            message: format!("crawl.diary_default_pages: {}", e),
        })
    }
}

/// Output file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,

    /// "csv" or "json"
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(defaults::OUTPUT_DIRECTORY),
            format: "csv".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output (stderr)
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to the platform data directory
    pub log_dir: Option<PathBuf>,

    /// Module-specific log level filters (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            module_filters: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load the optional file, then environment overrides, over the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!("Loading configuration from {:?}", path);
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Validation {
                message: message.to_string(),
            })
        };

        if self.http.max_requests_per_second == 0 {
            return invalid("http.max_requests_per_second must be greater than 0");
        }
        if self.http.timeout_seconds == 0 {
            return invalid("http.timeout_seconds must be greater than 0");
        }
        if self.crawl.enrichment_concurrency == 0 {
            return invalid("crawl.enrichment_concurrency must be greater than 0");
        }
        if !matches!(self.output.format.as_str(), "csv" | "json") {
            return invalid("output.format must be \"csv\" or \"json\"");
        }
        self.crawl.diary_default_selection()?;
        Ok(())
    }
}

/// Default directory for log files
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("listscraper")
        .join("logs")
}

/// Default configuration values
pub mod defaults {
    pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; listscraper/0.1)";

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Default requests per second per host
    pub const MAX_REQUESTS_PER_SECOND: u32 = 4;

    /// Default retries for transient failures
    pub const MAX_RETRIES: u32 = 2;

    pub const RETRY_BASE_DELAY_MS: u64 = 500;
    pub const RETRY_MAX_DELAY_MS: u64 = 8_000;

    /// Default films enriched at once within a page
    pub const ENRICHMENT_CONCURRENCY: usize = 4;

    /// Diaries are only crawled on their first page unless asked otherwise
    pub const DIARY_DEFAULT_PAGES: &str = "1";

    pub const OUTPUT_DIRECTORY: &str = "scraper_outputs";
}

/// Letterboxd site constants
pub mod letterboxd {
    pub const BASE_URL: &str = "https://letterboxd.com/";

    /// Path of the film detail page relative to the base URL
    pub fn film_path(slug: &str) -> String {
        format!("film/{slug}/")
    }

    /// Path of the stats fragment relative to the base URL
    pub fn stats_path(slug: &str) -> String {
        format!("csi/film/{slug}/stats/")
    }

    /// Path of the rating histogram fragment relative to the base URL
    pub fn histogram_path(slug: &str) -> String {
        format!("csi/film/{slug}/rating-histogram/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.crawl.diary_default_selection().unwrap(),
            PageSelection::Explicit(vec![1])
        );
    }

    #[test]
    fn test_validation_rejects_zero_rate() {
        let mut config = AppConfig::default();
        config.http.max_requests_per_second = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[http]\nmax_requests_per_second = 2\n\n[crawl]\ndiary_default_pages = \"1~3\"").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.http.max_requests_per_second, 2);
        assert_eq!(config.http.timeout_seconds, defaults::REQUEST_TIMEOUT_SECONDS);
        assert_eq!(
            config.crawl.diary_default_selection().unwrap(),
            PageSelection::Explicit(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_partial_parsing_section_keeps_other_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[parsing]\nnext_page_selectors = [\"a.next-page\"]").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        let defaults = ParsingConfig::default();
        assert_eq!(config.parsing.next_page_selectors, vec!["a.next-page".to_string()]);
        assert_eq!(config.parsing.base_url, defaults.base_url);
        assert_eq!(config.parsing.list_item_selectors, defaults.list_item_selectors);
        assert_eq!(config.parsing.film_detail, defaults.film_detail);
    }

    #[test]
    fn test_site_paths() {
        assert_eq!(letterboxd::stats_path("heat-1995"), "csi/film/heat-1995/stats/");
        assert_eq!(letterboxd::histogram_path("heat-1995"), "csi/film/heat-1995/rating-histogram/");
        assert_eq!(letterboxd::film_path("heat-1995"), "film/heat-1995/");
    }
}
