//! Application layer module
//!
//! Use cases that wire the crawler, extractor and enricher into record sets,
//! and the normalizer for structured diary dumps.

pub mod schema_normalizer;
pub mod scrape_use_case;

pub use schema_normalizer::{RawShape, SchemaNormalizer};
pub use scrape_use_case::{ListScraper, ScrapeOutcome, ScrapeRequest, ScrapeStats};
