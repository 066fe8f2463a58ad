//! listscraper - Letterboxd list and diary scraper
//!
//! Crawls list and diary pages, extracts each entry through declarative
//! fallback rules, enriches films from their detail, stats and histogram
//! pages, and writes the records as CSV or JSON.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{ListScraper, ScrapeOutcome, ScrapeRequest, SchemaNormalizer};
pub use domain::{CollectionKind, FieldValue, PageSelection, Record, Schema};
pub use infrastructure::{AppConfig, CrawlSession, Fetcher, HttpClient, OutputFormat, ScrapeError, ScrapeResult};
