//! Parsing context for HTML extraction

use url::Url;

use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// Context information for parsing operations
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Base URL for resolving relative links
    pub base_url: Url,

    /// URL of the document being parsed
    pub source_url: String,

    /// Collection page the document came from, if any
    pub page_number: Option<u32>,
}

impl ParseContext {
    pub fn new(base_url: &str, source_url: &str) -> ScrapeResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ScrapeError::invalid_url(base_url, e))?;
        Ok(Self {
            base_url,
            source_url: source_url.to_string(),
            page_number: None,
        })
    }

    pub fn with_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    /// Resolve a possibly relative link against the base URL
    pub fn resolve_url(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        self.base_url.join(href).ok().map(String::from)
    }
}
