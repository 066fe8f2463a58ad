//! Error types for parsing operations
//!
//! Re-exports the crate-wide scrape error so parsers can use a short path.

pub use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};
