//! Scrape use case: crawl a collection and assemble its records
//!
//! Pages are crawled in order. Items on a page are extracted and enriched
//! concurrently, up to the configured limit, and collected back in the order
//! they appeared on the page.

#![allow(clippy::uninlined_format_args)]

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::schemas::{diary, diary_schema, film, film_schema};
use crate::domain::{
    CollectionKind, FieldValue, ItemFragment, PageSelection, RatingHistogram, Record, Schema, TOTAL_RATINGS_FIELD,
};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::crawl_session::{CrawlSession, SessionStats};
use crate::infrastructure::crawling::PaginationCrawler;
use crate::infrastructure::enrichment::EnrichmentFetcher;
use crate::infrastructure::parsing::{CollectionPageParser, ParseContext, RuleSet, fragment_document};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// One collection to scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub collection_url: String,
    pub kind: CollectionKind,
    /// Pages to visit; `None` uses the default for the collection kind
    pub pages: Option<PageSelection>,
    /// Append a `List_URL` column holding `collection_url`
    pub list_url_column: bool,
}

impl ScrapeRequest {
    /// Request with the kind detected from the URL
    pub fn new(collection_url: &str) -> Self {
        Self {
            collection_url: collection_url.to_string(),
            kind: CollectionKind::detect(collection_url),
            pages: None,
            list_url_column: false,
        }
    }

    pub fn with_kind(mut self, kind: CollectionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn with_list_url_column(mut self, enabled: bool) -> Self {
        self.list_url_column = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub pages: usize,
    pub items: usize,
    /// Records with at least one field left as the sentinel
    pub degraded: usize,
}

#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub schema: Arc<Schema>,
    pub records: Vec<Record>,
    pub stats: ScrapeStats,
    /// The session was cancelled before the crawl finished
    pub cancelled: bool,
}

pub struct ListScraper {
    session: Arc<CrawlSession>,
    base_url: Url,
    list_crawler: PaginationCrawler,
    diary_crawler: PaginationCrawler,
    list_rules: RuleSet,
    diary_rules: RuleSet,
    enricher: EnrichmentFetcher,
    concurrency: usize,
    enrich_diary: bool,
    diary_default_pages: PageSelection,
    deadline: Option<Duration>,
    film_schema: Arc<Schema>,
    diary_schema: Arc<Schema>,
}

impl ListScraper {
    pub fn new(config: &AppConfig, session: Arc<CrawlSession>) -> ScrapeResult<Self> {
        let parsing = &config.parsing;
        let base_url = Url::parse(&parsing.base_url).map_err(|e| ScrapeError::invalid_url(&parsing.base_url, e))?;
        let crawler = |kind| -> ScrapeResult<PaginationCrawler> {
            let parser = CollectionPageParser::new(kind, parsing)?;
            Ok(PaginationCrawler::new(session.clone(), Arc::new(parser), &parsing.base_url))
        };

        Ok(Self {
            list_crawler: crawler(CollectionKind::List)?,
            diary_crawler: crawler(CollectionKind::Diary)?,
            list_rules: RuleSet::compile(&parsing.list_item)?,
            diary_rules: RuleSet::compile(&parsing.diary_item)?,
            enricher: EnrichmentFetcher::new(session.clone(), parsing)?,
            concurrency: config.crawl.enrichment_concurrency.max(1),
            enrich_diary: config.crawl.enrich_diary_entries,
            diary_default_pages: config
                .crawl
                .diary_default_selection()
                .map_err(|e| ScrapeError::configuration(e.to_string()))?,
            deadline: config.crawl.deadline_seconds.map(Duration::from_secs),
            film_schema: Arc::new(film_schema()),
            diary_schema: Arc::new(diary_schema()),
            session,
            base_url,
        })
    }

    pub fn session(&self) -> &Arc<CrawlSession> {
        &self.session
    }

    /// Cancel the session once the configured deadline passes
    pub fn arm_deadline(&self) -> Option<JoinHandle<()>> {
        self.deadline.map(|deadline| {
            info!("⏱️ Crawl deadline set to {:?}", deadline);
            self.session.cancel_after(deadline)
        })
    }

    pub fn schema_for(&self, kind: CollectionKind, list_url_column: bool) -> Arc<Schema> {
        let base = match kind {
            CollectionKind::List => &self.film_schema,
            CollectionKind::Diary => &self.diary_schema,
        };
        if list_url_column {
            Arc::new(base.with_field(film::LIST_URL))
        } else {
            base.clone()
        }
    }

    fn page_selection(&self, request: &ScrapeRequest) -> PageSelection {
        match (&request.pages, request.kind) {
            (Some(pages), _) => pages.clone(),
            (None, CollectionKind::Diary) => self.diary_default_pages.clone(),
            (None, CollectionKind::List) => PageSelection::All,
        }
    }

    /// Crawl one collection into records.
    ///
    /// A private or forbidden collection fails the whole request and no
    /// records are returned for it.
    pub async fn scrape(&self, request: &ScrapeRequest) -> ScrapeResult<ScrapeOutcome> {
        let selection = self.page_selection(request);
        let schema = self.schema_for(request.kind, request.list_url_column);
        let crawler = match request.kind {
            CollectionKind::List => &self.list_crawler,
            CollectionKind::Diary => &self.diary_crawler,
        };

        info!("🚀 Scraping {} {} (pages: {})", request.kind, request.collection_url, selection);

        let mut pages = std::pin::pin!(crawler.pages(&request.collection_url, selection));
        let mut records = Vec::new();
        let mut stats = ScrapeStats::default();

        while let Some(page) = pages.next().await {
            let page = page?;
            stats.pages += 1;
            stats.items += page.items.len();

            let page_records: Vec<Record> = stream::iter(page.items)
                .map(|fragment| self.process_item(fragment, request, &schema))
                .buffered(self.concurrency)
                .collect()
                .await;

            debug!("Page {} produced {} records", page.page_number, page_records.len());
            records.extend(page_records);
        }

        stats.degraded = records.iter().filter(|record| record.found_count() < schema.len()).count();
        let cancelled = self.session.is_cancelled();
        let SessionStats { requests, retries, failures } = self.session.stats();

        info!(
            "✅ {}: {} records from {} pages ({} with missing fields)",
            request.collection_url,
            records.len(),
            stats.pages,
            stats.degraded
        );
        info!("📊 Requests: {}, retries: {}, failed: {}", requests, retries, failures);
        if cancelled {
            warn!("🛑 Crawl of {} was cancelled, results are partial", request.collection_url);
        }

        Ok(ScrapeOutcome {
            schema,
            records,
            stats,
            cancelled,
        })
    }

    async fn process_item(&self, fragment: ItemFragment, request: &ScrapeRequest, schema: &Arc<Schema>) -> Record {
        let (rules, url_field) = match request.kind {
            CollectionKind::List => (&self.list_rules, film::FILM_URL),
            CollectionKind::Diary => (&self.diary_rules, diary::FILM_URL),
        };

        let mut record = Record::new(schema.clone());
        let film_url = {
            let document = fragment_document(&fragment);
            let context = ParseContext {
                base_url: self.base_url.clone(),
                source_url: fragment.page_url.clone(),
                page_number: Some(fragment.page_number),
            };
            let patch = rules.extract(&document, &context);
            record.apply(&patch);
            patch.get(url_field).and_then(FieldValue::as_text).map(str::to_string)
        };

        match (request.kind, film_url) {
            (CollectionKind::List, Some(url)) => {
                record.apply(&self.enricher.enrich(&url).await);
                check_histogram_total(&record);
            }
            (CollectionKind::List, None) => {
                warn!("⚠️ Item {} on page {} has no film link", fragment.index, fragment.page_number);
            }
            (CollectionKind::Diary, Some(url)) if self.enrich_diary => {
                record.apply(&self.enricher.enrich_diary(&url).await);
            }
            (CollectionKind::Diary, _) => {}
        }

        if request.list_url_column {
            record.set(film::LIST_URL, request.collection_url.as_str());
        }
        record
    }
}

/// `Total_ratings` must equal the sum of the bucket columns
fn check_histogram_total(record: &Record) {
    let Some(total) = record.get(TOTAL_RATINGS_FIELD).and_then(FieldValue::as_integer) else {
        return;
    };
    let sum: i64 = RatingHistogram::column_names()
        .iter()
        .filter_map(|column| record.get(column).and_then(FieldValue::as_integer))
        .sum();
    if sum != total {
        warn!("Histogram total {} does not match bucket sum {}", total, sum);
    }
}
