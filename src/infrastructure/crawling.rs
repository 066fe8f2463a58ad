//! Pagination crawler
//!
//! Produces collection pages lazily as a `Stream`. Explicit page lists fetch
//! each requested page and skip the ones that fail. A full crawl starts at the
//! collection URL and follows next-page links until there is none, a link
//! points back to a page already visited, or a page fails to load.
//!
//! A private or forbidden collection ends the stream with an error. Once the
//! session is cancelled no further page is requested.

#![allow(clippy::uninlined_format_args)]

use async_stream::try_stream;
use futures::stream::{self, Stream, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{CollectionPage, ItemFragment, PageSelection, page_url};
use crate::infrastructure::crawl_session::CrawlSession;
use crate::infrastructure::parsing::{CollectionPageParser, ParseContext};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

#[derive(Clone)]
pub struct PaginationCrawler {
    session: Arc<CrawlSession>,
    parser: Arc<CollectionPageParser>,
    base_url: String,
}

impl PaginationCrawler {
    pub fn new(session: Arc<CrawlSession>, parser: Arc<CollectionPageParser>, base_url: &str) -> Self {
        Self {
            session,
            parser,
            base_url: base_url.to_string(),
        }
    }

    /// Lazily crawl the pages of `collection_url` selected by `selection`
    pub fn pages(
        &self,
        collection_url: &str,
        selection: PageSelection,
    ) -> impl Stream<Item = ScrapeResult<CollectionPage>> + Send + 'static {
        let crawler = self.clone();
        let collection_url = collection_url.to_string();

        try_stream! {
            match selection {
                PageSelection::Explicit(pages) => {
                    for page_number in pages {
                        if crawler.session.is_cancelled() {
                            info!("🛑 Crawl cancelled before page {}", page_number);
                            break;
                        }
                        let url = page_url(&collection_url, page_number);
                        match crawler.fetch_page(&url, page_number).await {
                            Ok(page) => yield page,
                            Err(ScrapeError::Cancelled) => break,
                            Err(err) if err.is_fatal() => Err(err)?,
                            Err(err) => warn!("⚠️ Skipping page {}: {}", page_number, err),
                        }
                    }
                }
                PageSelection::All => {
                    let mut visited = HashSet::new();
                    let mut next = Some(collection_url.clone());
                    let mut page_number: u32 = 1;

                    while let Some(url) = next.take() {
                        if crawler.session.is_cancelled() {
                            info!("🛑 Crawl cancelled before {}", url);
                            break;
                        }
                        if !visited.insert(visit_key(&url)) {
                            warn!("Next link {} was already visited, stopping", url);
                            break;
                        }
                        match crawler.fetch_page(&url, page_number).await {
                            Ok(page) => {
                                next = page.next_url.clone();
                                page_number += 1;
                                yield page;
                            }
                            Err(ScrapeError::Cancelled) => break,
                            Err(err) if err.is_fatal() => Err(err)?,
                            Err(err) => warn!("⚠️ Stopping crawl at page {}: {}", page_number, err),
                        }
                    }
                }
            }
        }
    }

    /// Item fragments of every crawled page, in discovery order
    pub fn items(
        &self,
        collection_url: &str,
        selection: PageSelection,
    ) -> impl Stream<Item = ScrapeResult<ItemFragment>> + Send + 'static {
        self.pages(collection_url, selection)
            .map_ok(|page| stream::iter(page.items.into_iter().map(Ok::<_, ScrapeError>)))
            .try_flatten()
    }

    /// Fetch and parse one collection page
    pub async fn fetch_page(&self, url: &str, page_number: u32) -> ScrapeResult<CollectionPage> {
        debug!("Fetching collection page {}: {}", page_number, url);

        let response = self.session.get(url).await.map_err(|err| match err {
            ScrapeError::HttpStatus { status, .. } if ScrapeError::is_access_denied_status(status) => {
                ScrapeError::PrivateOrForbiddenCollection {
                    url: url.to_string(),
                    status,
                }
            }
            ScrapeError::Cancelled => ScrapeError::Cancelled,
            other => ScrapeError::page_fetch_failure(url, Some(page_number), &other),
        })?;

        let context = ParseContext::new(&self.base_url, url)?.with_page(page_number);
        let page = self.parser.parse_page(&response.body, &context)?;
        info!("📄 Page {} has {} items", page_number, page.items.len());
        Ok(page)
    }
}

fn visit_key(url: &str) -> String {
    url.trim_end_matches('/').to_ascii_lowercase()
}
