//! Pipeline tests against an in-memory site
//!
//! Pages are served from a URL map; anything not in the map is a 404.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use futures::TryStreamExt;
use listscraper::application::{ListScraper, ScrapeRequest};
use listscraper::domain::{CollectionKind, FieldValue, PageSelection, page_url};
use listscraper::infrastructure::parsing::{CollectionPageParser, ParsingConfig};
use listscraper::infrastructure::{AppConfig, CrawlSession, FetchResponse, Fetcher, PaginationCrawler, ScrapeError, ScrapeResult};

const LIST_URL: &str = "https://letterboxd.com/dave/list/crime/";
const DIARY_URL: &str = "https://letterboxd.com/dave/films/diary/";

#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, (u16, String)>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<String>>,
}

impl FakeSite {
    fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), (200, body.into()));
        self
    }

    fn status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), (status, String::new()));
        self
    }

    fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    fn hits(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn total_hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch(&self, url: &str, _headers: &HeaderMap) -> ScrapeResult<FetchResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        Ok(match self.pages.get(url) {
            Some((status, body)) => FetchResponse::new(*status, body.clone()),
            None => FetchResponse::new(404, ""),
        })
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.http.max_requests_per_second = 1000;
    config.http.max_retries = 0;
    config.http.retry_base_delay_ms = 1;
    config.http.retry_max_delay_ms = 1;
    config.crawl.enrichment_concurrency = 4;
    config
}

fn scraper(site: &Arc<FakeSite>, config: &AppConfig) -> ListScraper {
    let session = CrawlSession::from_config(config, site.clone(), CancellationToken::new()).unwrap();
    ListScraper::new(config, Arc::new(session)).unwrap()
}

fn list_page(slugs: &[&str], next: Option<&str>) -> String {
    let items: String = slugs
        .iter()
        .map(|slug| format!(r#"<li class="posteritem"><div class="film-poster" data-target-link="/film/{slug}/"></div></li>"#))
        .collect();
    let next = next
        .map(|href| format!(r#"<a class="next" href="{href}">Older</a>"#))
        .unwrap_or_default();
    format!(r#"<html><body><ul class="js-list-entries">{items}</ul><div class="pagination">{next}</div></body></html>"#)
}

fn film_url(slug: &str) -> String {
    format!("https://letterboxd.com/film/{slug}/")
}

fn film_page(title: &str) -> String {
    format!(r#"<html><body><h1 class="primaryname"><span class="name">{title}</span></h1></body></html>"#)
}

fn film_urls(records: &[listscraper::Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.get("Film_URL").and_then(FieldValue::as_text).unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_explicit_pages_skip_failed_page() {
    let site = Arc::new(
        FakeSite::default()
            .page(&page_url(LIST_URL, 2), list_page(&["heat-1995", "thief"], None))
            .status(&page_url(LIST_URL, 5), 500),
    );
    let scraper = scraper(&site, &config());
    let request = ScrapeRequest::new(LIST_URL).with_pages(PageSelection::explicit([2, 5]));

    let outcome = scraper.scrape(&request).await.unwrap();

    assert_eq!(film_urls(&outcome.records), vec![film_url("heat-1995"), film_url("thief")]);
    assert_eq!(outcome.stats.pages, 1);
    assert_eq!(site.hits(&page_url(LIST_URL, 5)), 1);
}

#[tokio::test]
async fn test_full_crawl_stops_on_repeated_next_link() {
    let page2 = page_url(LIST_URL, 2);
    let page3 = page_url(LIST_URL, 3);
    let site = Arc::new(
        FakeSite::default()
            .page(LIST_URL, list_page(&["a"], Some("/dave/list/crime/page/2/")))
            .page(&page2, list_page(&["b"], Some("/dave/list/crime/page/3/")))
            .page(&page3, list_page(&["c"], Some("/dave/list/crime/page/2/"))),
    );
    let scraper = scraper(&site, &config());

    let outcome = scraper.scrape(&ScrapeRequest::new(LIST_URL)).await.unwrap();

    assert_eq!(outcome.stats.pages, 3);
    assert_eq!(film_urls(&outcome.records), vec![film_url("a"), film_url("b"), film_url("c")]);
    assert_eq!(site.hits(&page2), 1);
}

#[tokio::test]
async fn test_full_crawl_ends_at_failed_page() {
    let site = Arc::new(FakeSite::default().page(LIST_URL, list_page(&["a"], Some("/dave/list/crime/page/2/"))));
    let scraper = scraper(&site, &config());

    let outcome = scraper.scrape(&ScrapeRequest::new(LIST_URL)).await.unwrap();
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.stats.pages, 1);
}

#[tokio::test]
async fn test_private_collection_is_fatal() {
    let site = Arc::new(FakeSite::default().status(DIARY_URL, 403).status(&page_url(DIARY_URL, 1), 403));
    let scraper = scraper(&site, &config());

    let result = scraper.scrape(&ScrapeRequest::new(DIARY_URL)).await;
    assert!(matches!(
        result,
        Err(ScrapeError::PrivateOrForbiddenCollection { status: 403, .. })
    ));
}

#[tokio::test]
async fn test_private_page_after_records_yields_nothing() {
    let site = Arc::new(
        FakeSite::default()
            .page(LIST_URL, list_page(&["a"], Some("/dave/list/crime/page/2/")))
            .status(&page_url(LIST_URL, 2), 401),
    );
    let scraper = scraper(&site, &config());

    let result = scraper.scrape(&ScrapeRequest::new(LIST_URL)).await;
    assert!(matches!(result, Err(ScrapeError::PrivateOrForbiddenCollection { .. })));
}

#[tokio::test]
async fn test_enrichment_preserves_page_order() {
    let slugs = ["first", "second", "third", "fourth", "fifth", "sixth"];
    let mut site = FakeSite::default().page(LIST_URL, list_page(&slugs, None));
    for (i, slug) in slugs.iter().enumerate() {
        let delay = Duration::from_millis(10 * (slugs.len() - i) as u64);
        site = site.page(&film_url(slug), film_page(slug)).delay(&film_url(slug), delay);
    }
    let site = Arc::new(site);
    let scraper = scraper(&site, &config());

    let outcome = scraper.scrape(&ScrapeRequest::new(LIST_URL)).await.unwrap();

    let titles: Vec<String> = outcome
        .records
        .iter()
        .map(|record| record.get("Film_title").map(FieldValue::to_cell).unwrap_or_default())
        .collect();
    assert_eq!(titles, slugs);
}

#[tokio::test]
async fn test_missing_fields_hold_sentinel() {
    let page = r#"<ul class="js-list-entries">
        <li class="posteritem" data-owner-rating="7"><div data-target-link="/film/heat-1995/"></div></li>
        <li class="posteritem"><div data-target-link="/film/thief/"></div></li>
    </ul>"#;
    let site = Arc::new(
        FakeSite::default()
            .page(LIST_URL, page)
            .page(&film_url("heat-1995"), film_page("Heat")),
    );
    let scraper = scraper(&site, &config());

    let outcome = scraper.scrape(&ScrapeRequest::new(LIST_URL)).await.unwrap();
    let heat = &outcome.records[0];
    let thief = &outcome.records[1];

    assert_eq!(heat.get("Owner_rating"), Some(&FieldValue::Float(3.5)));
    assert_eq!(heat.get("Film_title"), Some(&FieldValue::text("Heat")));
    assert_eq!(thief.get("Owner_rating"), Some(&FieldValue::NotFound));
    assert_eq!(thief.get("Film_title"), Some(&FieldValue::NotFound));
    assert_eq!(thief.get("Film_URL"), Some(&FieldValue::text(film_url("thief"))));
    assert_eq!(outcome.records.iter().map(|r| r.schema().len()).max(), Some(29));
    assert_eq!(outcome.stats.degraded, 2);
}

#[tokio::test]
async fn test_histogram_total_is_bucket_sum() {
    let bars: String = [1, 0, 2, 0, 3, 0, 4, 0, 5, 0]
        .iter()
        .map(|n| format!(r#"<li class="rating-histogram-bar"><a title="{n} ratings (1%)"></a></li>"#))
        .collect();
    let histogram = format!(r#"<a class="all-link more-link" href="/film/heat-1995/fans/">2.5K fans</a><ul>{bars}</ul>"#);
    let site = Arc::new(
        FakeSite::default()
            .page(LIST_URL, list_page(&["heat-1995"], None))
            .page("https://letterboxd.com/csi/film/heat-1995/rating-histogram/", histogram),
    );
    let scraper = scraper(&site, &config());

    let outcome = scraper.scrape(&ScrapeRequest::new(LIST_URL)).await.unwrap();
    let record = &outcome.records[0];

    assert_eq!(record.get("Total_ratings"), Some(&FieldValue::Integer(15)));
    assert_eq!(record.get("★★★★½"), Some(&FieldValue::Integer(5)));
    assert_eq!(record.get("Fans"), Some(&FieldValue::Integer(2500)));
}

#[tokio::test]
async fn test_diary_defaults_to_first_page() {
    let row = r#"<tr class="diary-entry-row">
        <td class="td-day"><a href="/dave/films/diary/for/2024/03/07/">7</a></td>
        <td class="td-film-details"><h3><a href="/film/heat-1995/">Heat</a></h3></td>
        <td class="td-released">1995</td>
    </tr>"#;
    let page = format!(
        r#"<table><tbody>{row}</tbody></table><a class="next" href="/dave/films/diary/page/2/">Older</a>"#
    );
    let site = Arc::new(FakeSite::default().page(&page_url(DIARY_URL, 1), page));
    let scraper = scraper(&site, &config());

    let outcome = scraper.scrape(&ScrapeRequest::new(DIARY_URL)).await.unwrap();

    assert_eq!(outcome.stats.pages, 1);
    assert_eq!(site.hits(&page_url(DIARY_URL, 2)), 0);
    let entry = &outcome.records[0];
    assert_eq!(entry.get("date"), Some(&FieldValue::text("2024-03-07")));
    assert_eq!(entry.get("film_title"), Some(&FieldValue::text("Heat")));
    assert_eq!(entry.get("year"), Some(&FieldValue::text("1995")));
    assert_eq!(entry.get("film_url"), Some(&FieldValue::text(film_url("heat-1995"))));
    assert_eq!(entry.get("director"), Some(&FieldValue::NotFound));
}

#[tokio::test]
async fn test_list_url_column() {
    let site = Arc::new(FakeSite::default().page(LIST_URL, list_page(&["a"], None)));
    let scraper = scraper(&site, &config());
    let request = ScrapeRequest::new(LIST_URL)
        .with_kind(CollectionKind::List)
        .with_list_url_column(true);

    let outcome = scraper.scrape(&request).await.unwrap();
    assert_eq!(outcome.records[0].get("List_URL"), Some(&FieldValue::text(LIST_URL)));
}

#[tokio::test]
async fn test_cancelled_crawl_issues_no_requests() {
    let site = Arc::new(FakeSite::default().page(LIST_URL, list_page(&["a"], None)));
    let scraper = scraper(&site, &config());
    scraper.session().cancel();

    let outcome = scraper.scrape(&ScrapeRequest::new(LIST_URL)).await.unwrap();
    assert!(outcome.cancelled);
    assert!(outcome.records.is_empty());
    assert_eq!(site.total_hits(), 0);
}

#[tokio::test]
async fn test_cancel_during_enrichment_keeps_discovered_records() {
    let slow_histogram = "https://letterboxd.com/csi/film/heat-1995/rating-histogram/";
    let site = Arc::new(
        FakeSite::default()
            .page(LIST_URL, list_page(&["heat-1995", "thief"], None))
            .page(&film_url("heat-1995"), film_page("Heat"))
            .page(&film_url("thief"), film_page("Thief"))
            .page(slow_histogram, r#"<li class="rating-histogram-bar"><a title="3 ratings (1%)"></a></li>"#)
            .delay(slow_histogram, Duration::from_secs(5)),
    );
    let scraper = scraper(&site, &config());
    let _timer = scraper.session().cancel_after(Duration::from_millis(200));

    let started = std::time::Instant::now();
    let outcome = scraper.scrape(&ScrapeRequest::new(LIST_URL)).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(outcome.cancelled);
    assert_eq!(film_urls(&outcome.records), vec![film_url("heat-1995"), film_url("thief")]);

    let heat = &outcome.records[0];
    assert_eq!(heat.get("Film_title"), Some(&FieldValue::text("Heat")));
    assert_eq!(heat.get("Total_ratings"), Some(&FieldValue::NotFound));
    assert_eq!(heat.get("★★★★★"), Some(&FieldValue::NotFound));
    assert_eq!(outcome.records[1].get("Film_title"), Some(&FieldValue::text("Thief")));
}

#[tokio::test]
async fn test_crawler_streams_item_fragments() {
    let config = config();
    let site = Arc::new(
        FakeSite::default()
            .page(LIST_URL, list_page(&["a", "b"], Some("/dave/list/crime/page/2/")))
            .page(&page_url(LIST_URL, 2), list_page(&["c"], None)),
    );
    let session = Arc::new(CrawlSession::from_config(&config, site.clone(), CancellationToken::new()).unwrap());
    let parser = CollectionPageParser::new(CollectionKind::List, &ParsingConfig::default()).unwrap();
    let crawler = PaginationCrawler::new(session, Arc::new(parser), "https://letterboxd.com/");

    let items: Vec<_> = crawler.items(LIST_URL, PageSelection::All).try_collect().await.unwrap();

    let positions: Vec<(u32, usize)> = items.iter().map(|item| (item.page_number, item.index)).collect();
    assert_eq!(positions, vec![(1, 0), (1, 1), (2, 0)]);
}
