//! Collection page parser
//!
//! Splits a list or diary page into item fragments and locates the link to
//! the following page. Item containers are tried in order and the first
//! selector that matches anything defines the page's items.

#![allow(clippy::uninlined_format_args)]

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::{ContextualParser, ParseContext, ParsingConfig, ScrapeResult, compile_selectors};
use crate::domain::{CollectionKind, CollectionPage, ItemFragment};

/// Parser for list and diary pages
#[derive(Debug)]
pub struct CollectionPageParser {
    kind: CollectionKind,
    item_selectors: Vec<Selector>,
    next_selectors: Vec<Selector>,
}

impl CollectionPageParser {
    pub fn new(kind: CollectionKind, config: &ParsingConfig) -> ScrapeResult<Self> {
        let items = match kind {
            CollectionKind::List => &config.list_item_selectors,
            CollectionKind::Diary => &config.diary_item_selectors,
        };
        Ok(Self {
            kind,
            item_selectors: compile_selectors(items)?,
            next_selectors: compile_selectors(&config.next_page_selectors)?,
        })
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Parse raw page HTML into a `CollectionPage`
    pub fn parse_page(&self, html: &str, context: &ParseContext) -> ScrapeResult<CollectionPage> {
        let document = Html::parse_document(html);
        self.parse_with_context(&document, context)
    }

    fn extract_items(&self, document: &Html, context: &ParseContext, page_number: u32) -> Vec<ItemFragment> {
        for (i, selector) in self.item_selectors.iter().enumerate() {
            let elements: Vec<ElementRef<'_>> = document.select(selector).collect();
            if elements.is_empty() {
                continue;
            }

            debug!("Found {} {} items using container selector {}", elements.len(), self.kind, i);
            return elements
                .into_iter()
                .enumerate()
                .map(|(index, element)| ItemFragment {
                    page_number,
                    index,
                    page_url: context.source_url.clone(),
                    html: element.html(),
                })
                .collect();
        }

        warn!("No {} items found on {}", self.kind, context.source_url);
        Vec::new()
    }

    /// Absolute URL of the next page, resolved against the current page
    fn find_next_url(&self, document: &Html, context: &ParseContext) -> Option<String> {
        let href = self
            .next_selectors
            .iter()
            .find_map(|selector| document.select(selector).find_map(|el| el.value().attr("href")))?;

        let resolved = Url::parse(&context.source_url)
            .and_then(|page| page.join(href))
            .map(String::from)
            .ok()
            .or_else(|| context.resolve_url(href));

        if resolved.is_none() {
            warn!("Could not resolve next page link '{}' on {}", href, context.source_url);
        }
        resolved
    }
}

impl ContextualParser for CollectionPageParser {
    type Output = CollectionPage;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ScrapeResult<Self::Output> {
        let page_number = context.page_number.unwrap_or(1);
        let items = self.extract_items(html, context, page_number);
        let next_url = self.find_next_url(html, context);

        Ok(CollectionPage {
            url: context.source_url.clone(),
            page_number,
            items,
            next_url,
        })
    }
}
