//! HTML parsing infrastructure
//!
//! Trait-based parsers over `scraper` documents. Collection pages are split
//! into owned item fragments; films, stats and histograms are read through
//! declarative rule sets compiled from `ParsingConfig`.

pub mod collection_parser;
pub mod config;
pub mod context;
pub mod error;
pub mod histogram_parser;
pub mod rules;

pub use collection_parser::CollectionPageParser;
pub use config::ParsingConfig;
pub use context::ParseContext;
pub use error::{ScrapeError, ScrapeResult};
pub use histogram_parser::HistogramParser;
pub use rules::{FieldMiss, RuleSet};

use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::domain::ItemFragment;

/// Enhanced parser trait with context support
pub trait ContextualParser {
    type Output;
    type Context;

    /// Parse HTML with contextual information
    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ScrapeResult<Self::Output>;
}

/// Compile multiple selector strings, skipping the invalid ones
pub(crate) fn compile_selectors(selector_strings: &[String]) -> ScrapeResult<Vec<Selector>> {
    let mut selectors = Vec::new();
    let mut errors = Vec::new();

    for selector_str in selector_strings {
        match Selector::parse(selector_str) {
            Ok(selector) => selectors.push(selector),
            Err(e) => {
                warn!("Failed to compile selector '{}': {}", selector_str, e);
                errors.push(format!("'{selector_str}': {e}"));
            }
        }
    }

    if selectors.is_empty() {
        return Err(ScrapeError::invalid_selector(
            &selector_strings.join(", "),
            format!("no valid selectors compiled: {}", errors.join(", ")),
        ));
    }

    if !errors.is_empty() {
        debug!("Some selectors failed to compile: {}", errors.join(", "));
    }

    Ok(selectors)
}

/// Re-parse an item fragment; table rows are wrapped so the parser keeps them
pub fn fragment_document(fragment: &ItemFragment) -> Html {
    let trimmed = fragment.html.trim_start();
    if trimmed.starts_with("<tr") {
        Html::parse_fragment(&format!("<table><tbody>{}</tbody></table>", fragment.html))
    } else {
        Html::parse_fragment(&fragment.html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_selectors_skips_invalid() {
        let selectors = compile_selectors(&["a.next".to_string(), "a[[[".to_string()]).unwrap();
        assert_eq!(selectors.len(), 1);
        assert!(compile_selectors(&["a[[[".to_string()]).is_err());
    }

    #[test]
    fn test_table_row_fragment_keeps_cells() {
        let fragment = ItemFragment {
            page_number: 1,
            index: 0,
            page_url: "https://letterboxd.com/dave/films/diary/".into(),
            html: "<tr class=\"diary-entry-row\"><td class=\"td-film-details\">Heat</td></tr>".into(),
        };
        let doc = fragment_document(&fragment);
        let cell = Selector::parse("tr.diary-entry-row td.td-film-details").unwrap();
        assert_eq!(doc.select(&cell).count(), 1);
    }
}
