//! Rating histogram fragment parser
//!
//! Reads the fan count through its rule set and the ten rating bars into a
//! `RatingHistogram`, then flattens both into record fields.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{ContextualParser, ParseContext, ParsingConfig, RuleSet, ScrapeError, ScrapeResult, compile_selectors};
use crate::domain::{FieldValue, RatingHistogram, RecordPatch, TOTAL_RATINGS_FIELD};
use crate::domain::value_normalizer::histogram_bar_count;

#[derive(Debug)]
pub struct HistogramParser {
    bar_selectors: Vec<Selector>,
    tooltip_selector: Selector,
    rules: RuleSet,
}

impl HistogramParser {
    pub fn new(config: &ParsingConfig) -> ScrapeResult<Self> {
        let tooltip_selector =
            Selector::parse("[title], [data-original-title]").map_err(|e| ScrapeError::invalid_selector("[title]", e))?;
        Ok(Self {
            bar_selectors: compile_selectors(&config.histogram_bar_selectors)?,
            tooltip_selector,
            rules: RuleSet::compile(&config.rating_histogram)?,
        })
    }

    /// Bucket counts; a fragment without bars (unreleased film) is all zeros
    pub fn histogram(&self, document: &Html) -> RatingHistogram {
        let bars: Vec<ElementRef<'_>> = self
            .bar_selectors
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|bars| !bars.is_empty())
            .unwrap_or_default();

        if bars.is_empty() {
            debug!("No rating histogram bars found");
            return RatingHistogram::empty();
        }

        RatingHistogram::from_counts(bars.into_iter().map(|bar| histogram_bar_count(&self.bar_text(bar))))
    }

    fn bar_text(&self, bar: ElementRef<'_>) -> String {
        std::iter::once(bar)
            .chain(bar.select(&self.tooltip_selector))
            .find_map(|el| {
                el.value()
                    .attr("data-original-title")
                    .or_else(|| el.value().attr("title"))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| bar.text().collect())
    }

    /// Every histogram field set to the sentinel
    pub fn sentinel_patch(&self) -> RecordPatch {
        let mut patch = self.rules.sentinel_patch();
        for column in RatingHistogram::column_names() {
            patch.set(column, FieldValue::NotFound);
        }
        patch.set(TOTAL_RATINGS_FIELD, FieldValue::NotFound);
        patch
    }
}

impl ContextualParser for HistogramParser {
    type Output = RecordPatch;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ScrapeResult<Self::Output> {
        let mut patch = self.rules.extract(html, context);
        let histogram = self.histogram(html);

        for (column, (_, count)) in RatingHistogram::column_names().into_iter().zip(histogram.iter()) {
            patch.set(column, count);
        }
        patch.set(TOTAL_RATINGS_FIELD, histogram.total());
        Ok(patch)
    }
}
