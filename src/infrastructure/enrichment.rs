//! Enrichment fetcher
//!
//! Completes a film record from its secondary resources: the film page, the
//! stats fragment and the rating histogram fragment. The three are fetched
//! concurrently through the crawl session. A secondary that fails to load is
//! logged as a `SecondaryFetchFailure` and its fields are left as the
//! sentinel; the record itself is never dropped.

#![allow(clippy::uninlined_format_args)]

use futures::future::join_all;
use scraper::Html;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::domain::RecordPatch;
use crate::infrastructure::config::letterboxd;
use crate::infrastructure::crawl_session::CrawlSession;
use crate::infrastructure::parsing::{ContextualParser, HistogramParser, ParseContext, ParsingConfig, RuleSet};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// Secondary resources of a film
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryKind {
    Detail,
    Stats,
    Histogram,
    /// Film page read for diary entries
    DiaryDetail,
}

impl fmt::Display for SecondaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Detail => "detail",
            Self::Stats => "stats",
            Self::Histogram => "histogram",
            Self::DiaryDetail => "diary detail",
        };
        f.write_str(name)
    }
}

pub struct EnrichmentFetcher {
    session: Arc<CrawlSession>,
    base_url: Url,
    detail: RuleSet,
    stats: RuleSet,
    histogram: HistogramParser,
    diary: RuleSet,
}

impl EnrichmentFetcher {
    pub fn new(session: Arc<CrawlSession>, config: &ParsingConfig) -> ScrapeResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ScrapeError::invalid_url(&config.base_url, e))?;
        Ok(Self {
            session,
            base_url,
            detail: RuleSet::compile(&config.film_detail)?,
            stats: RuleSet::compile(&config.film_stats)?,
            histogram: HistogramParser::new(config)?,
            diary: RuleSet::compile(&config.diary_enrichment)?,
        })
    }

    /// Last non-empty path segment of a film URL
    pub fn film_slug(film_url: &str) -> Option<String> {
        let parsed = Url::parse(film_url).ok()?;
        let slug = parsed.path_segments()?.filter(|segment| !segment.is_empty()).last()?;
        Some(slug.to_string())
    }

    /// URLs of the detail page, stats fragment and histogram fragment
    pub fn secondary_urls(&self, film_url: &str) -> ScrapeResult<Vec<(SecondaryKind, String)>> {
        let slug = Self::film_slug(film_url).ok_or_else(|| ScrapeError::invalid_url(film_url, "no film slug"))?;
        let join = |path: String| {
            self.base_url
                .join(&path)
                .map(String::from)
                .map_err(|e| ScrapeError::invalid_url(&path, e))
        };

        Ok(vec![
            (SecondaryKind::Detail, join(letterboxd::film_path(&slug))?),
            (SecondaryKind::Stats, join(letterboxd::stats_path(&slug))?),
            (SecondaryKind::Histogram, join(letterboxd::histogram_path(&slug))?),
        ])
    }

    /// Fields from every secondary resource of `film_url`
    pub async fn enrich(&self, film_url: &str) -> RecordPatch {
        let secondaries = match self.secondary_urls(film_url) {
            Ok(secondaries) => secondaries,
            Err(err) => {
                warn!("⚠️ Cannot enrich '{}': {}", film_url, err);
                return self.sentinel_patch();
            }
        };

        let patches = join_all(
            secondaries
                .into_iter()
                .map(|(kind, url)| async move { self.fetch_secondary(kind, &url).await }),
        )
        .await;

        let mut patch = RecordPatch::new();
        for secondary in patches {
            patch.extend(secondary);
        }
        patch
    }

    /// Diary-only fields read from the entry's film page
    pub async fn enrich_diary(&self, film_url: &str) -> RecordPatch {
        match self.secondary_urls(film_url) {
            Ok(urls) => {
                let detail_url = urls
                    .into_iter()
                    .find(|(kind, _)| *kind == SecondaryKind::Detail)
                    .map(|(_, url)| url)
                    .unwrap_or_else(|| film_url.to_string());
                self.fetch_secondary(SecondaryKind::DiaryDetail, &detail_url).await
            }
            Err(err) => {
                warn!("⚠️ Cannot enrich diary entry '{}': {}", film_url, err);
                self.diary.sentinel_patch()
            }
        }
    }

    /// Every enrichment field set to the sentinel
    pub fn sentinel_patch(&self) -> RecordPatch {
        let mut patch = self.detail.sentinel_patch();
        patch.extend(self.stats.sentinel_patch());
        patch.extend(self.histogram.sentinel_patch());
        patch
    }

    async fn fetch_secondary(&self, kind: SecondaryKind, url: &str) -> RecordPatch {
        let outcome = match self.session.get(url).await {
            Ok(response) => self.parse_secondary(kind, url, &response.body),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(patch) => patch,
            Err(ScrapeError::Cancelled) => {
                debug!("Skipped {} fetch for {} after cancellation", kind, url);
                self.sentinel_for(kind)
            }
            Err(err) => {
                let failure = ScrapeError::secondary_fetch_failure(url, &err);
                warn!("⚠️ {} ({} fields left empty)", failure, kind);
                self.sentinel_for(kind)
            }
        }
    }

    fn parse_secondary(&self, kind: SecondaryKind, url: &str, body: &str) -> ScrapeResult<RecordPatch> {
        let document = Html::parse_document(body);
        let context = ParseContext::new(self.base_url.as_str(), url)?;
        match kind {
            SecondaryKind::Detail => self.detail.parse_with_context(&document, &context),
            SecondaryKind::Stats => self.stats.parse_with_context(&document, &context),
            SecondaryKind::Histogram => self.histogram.parse_with_context(&document, &context),
            SecondaryKind::DiaryDetail => self.diary.parse_with_context(&document, &context),
        }
    }

    fn sentinel_for(&self, kind: SecondaryKind) -> RecordPatch {
        match kind {
            SecondaryKind::Detail => self.detail.sentinel_patch(),
            SecondaryKind::Stats => self.stats.sentinel_patch(),
            SecondaryKind::Histogram => self.histogram.sentinel_patch(),
            SecondaryKind::DiaryDetail => self.diary.sentinel_patch(),
        }
    }
}
