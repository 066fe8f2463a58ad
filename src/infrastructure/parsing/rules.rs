//! Field extraction with ordered fallback rules
//!
//! A `RuleSet` is compiled once from its `RuleSetSpec` and applied to many
//! documents. For each field the rules are tried in declaration order; the
//! first rule whose selector matches, whose accessor finds a value and whose
//! normalizer accepts it wins. A field with no winning rule receives its
//! declared fallback, and a miss never affects the other fields.

#![allow(clippy::uninlined_format_args)]

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace, warn};

use super::config::{Accessor, FieldSpec, Normalizer, Position, RuleSetSpec, RuleSpec};
use super::{ContextualParser, ParseContext};
use crate::domain::rating::HalfStars;
use crate::domain::value_normalizer::{
    clean_text, concat_digits, first_integer, float_prefix, parse_compact_number, parse_date_parts,
};
use crate::domain::{FieldValue, RecordPatch, stars_to_value};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

static RATED_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"rated-(\d+)").expect("rated class regex"));

static DATE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})(?:/|$)").expect("date link regex"));

/// No rule produced a value for `field`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMiss {
    pub field: String,
    pub rules_tried: usize,
}

/// Raw value produced by an accessor
#[derive(Debug, Clone, PartialEq, Eq)]
enum Accessed {
    Single(String),
    Many(Vec<String>),
}

impl Accessed {
    fn into_scalar(self) -> Option<String> {
        match self {
            Self::Single(text) => Some(text),
            Self::Many(items) => items.into_iter().find(|item| !item.trim().is_empty()),
        }
    }

    fn into_items(self) -> Vec<String> {
        match self {
            Self::Single(text) => vec![text],
            Self::Many(items) => items,
        }
    }
}

/// A compiled selector with its accessor and normalizer
#[derive(Debug)]
pub struct ExtractionRule {
    source: String,
    selector: Selector,
    accessor: Accessor,
    position: Position,
    normalizer: Normalizer,
}

impl ExtractionRule {
    pub fn compile(spec: &RuleSpec) -> ScrapeResult<Self> {
        let selector = Selector::parse(&spec.selector).map_err(|e| ScrapeError::invalid_selector(&spec.selector, e))?;
        Ok(Self {
            source: spec.selector.clone(),
            selector,
            accessor: spec.accessor.clone(),
            position: spec.position,
            normalizer: spec.normalizer.clone(),
        })
    }

    pub fn selector(&self) -> &str {
        &self.source
    }

    /// Run this rule; `None` when it does not apply to the document
    pub fn apply(&self, document: &Html, context: &ParseContext) -> Option<FieldValue> {
        let accessed = self.access(document)?;
        normalize(&self.normalizer, accessed, context)
    }

    fn access(&self, document: &Html) -> Option<Accessed> {
        let matches: Vec<ElementRef<'_>> = document.select(&self.selector).collect();
        if matches.is_empty() {
            return None;
        }

        let pick = || match self.position {
            Position::First => matches.first().copied(),
            Position::Last => matches.last().copied(),
            Position::Nth(n) => matches.get(n).copied(),
        };

        match &self.accessor {
            Accessor::Text => pick().map(|el| Accessed::Single(element_text(el))),
            Accessor::OwnText => pick().and_then(own_text).map(Accessed::Single),
            Accessor::Attr { name } => pick()
                .and_then(|el| el.value().attr(name))
                .map(|value| Accessed::Single(value.to_string())),
            Accessor::AllText => Some(Accessed::Many(matches.iter().map(|el| element_text(*el)).collect())),
            Accessor::AllOwnText => Some(Accessed::Many(matches.iter().filter_map(|el| own_text(*el)).collect())),
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// First child of the element when it is a text node
fn own_text(element: ElementRef<'_>) -> Option<String> {
    element
        .children()
        .next()
        .and_then(|node| node.value().as_text().map(|text| String::from(&**text)))
}

fn normalize(normalizer: &Normalizer, accessed: Accessed, context: &ParseContext) -> Option<FieldValue> {
    match normalizer {
        Normalizer::List {
            exclude,
            dedup,
            non_empty,
        } => {
            let mut items: Vec<String> = Vec::new();
            for item in accessed.into_items() {
                let Some(item) = clean_text(&item) else { continue };
                if exclude.contains(&item) || (*dedup && items.contains(&item)) {
                    continue;
                }
                items.push(item);
            }
            if *non_empty && items.is_empty() {
                return None;
            }
            Some(FieldValue::List(items))
        }
        Normalizer::FirstItem => accessed
            .into_items()
            .iter()
            .find_map(|item| clean_text(item))
            .map(FieldValue::Text),
        scalar => {
            let text = accessed.into_scalar()?;
            normalize_scalar(scalar, &text, context)
        }
    }
}

fn normalize_scalar(normalizer: &Normalizer, text: &str, context: &ParseContext) -> Option<FieldValue> {
    match normalizer {
        Normalizer::Trimmed => clean_text(text).map(FieldValue::Text),
        Normalizer::Integer => first_integer(text).map(FieldValue::Integer),
        Normalizer::Year => first_integer(text).filter(|year| *year != 0).map(FieldValue::Integer),
        Normalizer::Digits => concat_digits(text).map(FieldValue::Integer),
        Normalizer::CompactNumber => {
            clean_text(text).map(|cleaned| FieldValue::from(parse_compact_number(&cleaned)))
        }
        Normalizer::FloatPrefix { len } => float_prefix(text, *len).map(FieldValue::Float),
        Normalizer::Stars => stars_to_value(text).map(FieldValue::Float),
        Normalizer::RatingText => {
            let cleaned = clean_text(text)?;
            if let Ok(value) = cleaned.parse::<f64>() {
                return Some(FieldValue::Float(value));
            }
            Some(stars_to_value(&cleaned).map_or(FieldValue::Text(cleaned), FieldValue::Float))
        }
        Normalizer::HalfOfInteger => {
            // an explicit zero is final: the owner left the film unrated
            let half_stars: i32 = text.trim().parse().ok()?;
            Some(if half_stars == 0 {
                FieldValue::NotFound
            } else {
                FieldValue::Float(f64::from(half_stars) / 2.0)
            })
        }
        Normalizer::RatedClass => {
            let caps = RATED_CLASS.captures(text)?;
            let units: u8 = caps[1].parse().ok()?;
            HalfStars::new(units).map(|rating| FieldValue::Float(rating.value()))
        }
        Normalizer::StripParens => {
            clean_text(text.trim().trim_start_matches('(').trim_end_matches(')')).map(FieldValue::Text)
        }
        Normalizer::AbsoluteUrl => context.resolve_url(text).map(FieldValue::Text),
        Normalizer::DateFromLink => {
            let caps = DATE_LINK.captures(text)?;
            parse_date_parts(caps.get(1).map(|m| m.as_str()), caps.get(2).map(|m| m.as_str()), caps.get(3).map(|m| m.as_str()))
                .map(FieldValue::Text)
        }
        Normalizer::List { .. } | Normalizer::FirstItem => None,
    }
}

/// Ordered rules for one field
#[derive(Debug)]
pub struct FieldRules {
    field: String,
    rules: Vec<ExtractionRule>,
    fallback: FieldValue,
}

impl FieldRules {
    pub fn compile(spec: &FieldSpec) -> ScrapeResult<Self> {
        let mut rules = Vec::with_capacity(spec.rules.len());
        let mut errors = Vec::new();

        for rule in &spec.rules {
            match ExtractionRule::compile(rule) {
                Ok(compiled) => rules.push(compiled),
                Err(e) => {
                    warn!("Failed to compile selector '{}' for field '{}': {}", rule.selector, spec.field, e);
                    errors.push(e.to_string());
                }
            }
        }

        if rules.is_empty() && !spec.rules.is_empty() {
            return Err(ScrapeError::invalid_selector(
                &spec.field,
                format!("no valid selectors compiled: {}", errors.join(", ")),
            ));
        }

        Ok(Self {
            field: spec.field.clone(),
            rules,
            fallback: spec.fallback.clone(),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn fallback(&self) -> &FieldValue {
        &self.fallback
    }

    /// First successful rule's value, stopping at the first success
    pub fn resolve(&self, document: &Html, context: &ParseContext) -> Result<FieldValue, FieldMiss> {
        for rule in &self.rules {
            if let Some(value) = rule.apply(document, context) {
                trace!("Field '{}' resolved by '{}'", self.field, rule.selector());
                return Ok(value);
            }
        }
        Err(FieldMiss {
            field: self.field.clone(),
            rules_tried: self.rules.len(),
        })
    }
}

/// Compiled rules for every field of one document type
#[derive(Debug)]
pub struct RuleSet {
    name: String,
    fields: Vec<FieldRules>,
}

impl RuleSet {
    pub fn compile(spec: &RuleSetSpec) -> ScrapeResult<Self> {
        let fields = spec.fields.iter().map(FieldRules::compile).collect::<ScrapeResult<Vec<_>>>()?;
        Ok(Self {
            name: spec.name.clone(),
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(FieldRules::field)
    }

    /// Values for every field of this rule set
    pub fn extract(&self, document: &Html, context: &ParseContext) -> RecordPatch {
        let mut patch = RecordPatch::new();
        let mut misses = 0_usize;

        for field in &self.fields {
            match field.resolve(document, context) {
                Ok(value) => patch.set(field.field(), value),
                Err(miss) => {
                    misses += 1;
                    trace!("Field '{}' missed after {} rules", miss.field, miss.rules_tried);
                    patch.set(field.field(), field.fallback().clone());
                }
            }
        }

        if misses > 0 {
            debug!("{}: {} of {} fields fell back for {}", self.name, misses, self.fields.len(), context.source_url);
        }
        patch
    }

    /// Every field of this rule set set to the sentinel
    pub fn sentinel_patch(&self) -> RecordPatch {
        let mut patch = RecordPatch::new();
        for field in &self.fields {
            patch.set(field.field(), FieldValue::NotFound);
        }
        patch
    }
}

impl ContextualParser for RuleSet {
    type Output = RecordPatch;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ScrapeResult<Self::Output> {
        Ok(self.extract(html, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::config::ParsingConfig;

    fn context() -> ParseContext {
        ParseContext::new("https://letterboxd.com/", "https://letterboxd.com/film/heat-1995/").unwrap()
    }

    fn field(name: &str, rules: Vec<RuleSpec>) -> RuleSet {
        RuleSet::compile(&RuleSetSpec {
            name: "test".into(),
            fields: vec![FieldSpec::new(name, rules)],
        })
        .unwrap()
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rules = field(
            "title",
            vec![RuleSpec::new("h1.new-title"), RuleSpec::new("h1.old-title"), RuleSpec::new("h1")],
        );
        let doc = Html::parse_document("<h1 class='old-title'> Heat </h1><h1>Other</h1>");
        let patch = rules.extract(&doc, &context());
        assert_eq!(patch.get("title"), Some(&FieldValue::text("Heat")));
    }

    #[test]
    fn test_rejected_value_tries_next_rule() {
        let rules = field(
            "year",
            vec![
                RuleSpec::new("span.year").normalize(Normalizer::Year),
                RuleSpec::new("a.year").normalize(Normalizer::Year),
            ],
        );
        let doc = Html::parse_document("<span class='year'>0</span><a class='year'>1995</a>");
        assert_eq!(rules.extract(&doc, &context()).get("year"), Some(&FieldValue::Integer(1995)));
    }

    #[test]
    fn test_missing_field_gets_sentinel_without_affecting_others() {
        let rules = RuleSet::compile(&RuleSetSpec {
            name: "test".into(),
            fields: vec![
                FieldSpec::new("title", vec![RuleSpec::new("h1")]),
                FieldSpec::new("runtime", vec![RuleSpec::new("p.runtime").normalize(Normalizer::Integer)]),
                FieldSpec::new("fans", vec![RuleSpec::new("a.fans")]).with_fallback(FieldValue::Integer(0)),
            ],
        })
        .unwrap();
        let doc = Html::parse_document("<h1>Heat</h1>");
        let patch = rules.extract(&doc, &context());

        assert_eq!(patch.get("title"), Some(&FieldValue::text("Heat")));
        assert_eq!(patch.get("runtime"), Some(&FieldValue::NotFound));
        assert_eq!(patch.get("fans"), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn test_invalid_selectors_are_skipped() {
        let rules = field("title", vec![RuleSpec::new("h1[[["), RuleSpec::new("h1")]);
        let doc = Html::parse_document("<h1>Heat</h1>");
        assert_eq!(rules.extract(&doc, &context()).get("title"), Some(&FieldValue::text("Heat")));

        let all_invalid = RuleSet::compile(&RuleSetSpec {
            name: "bad".into(),
            fields: vec![FieldSpec::new("title", vec![RuleSpec::new("h1[[[")])],
        });
        assert!(matches!(all_invalid, Err(ScrapeError::InvalidSelector { .. })));
    }

    #[test]
    fn test_list_normalizer_excludes_and_dedups() {
        let rules = field(
            "langs",
            vec![RuleSpec::new("a").all_own_text().normalize(Normalizer::List {
                exclude: vec!["Show All…".into()],
                dedup: true,
                non_empty: true,
            })],
        );
        let doc = Html::parse_document(
            "<a>English</a><a>French</a><a>English</a><a>Show All…</a><a><span>icon</span></a>",
        );
        assert_eq!(
            rules.extract(&doc, &context()).get("langs"),
            Some(&FieldValue::List(vec!["English".into(), "French".into()]))
        );
    }

    #[test]
    fn test_rating_normalizers() {
        let ctx = context();
        let rated = Html::parse_fragment("<span class='rating rated-7'>★★★½</span>");
        let by_class = field("r", vec![RuleSpec::new("span").attr("class").normalize(Normalizer::RatedClass)]);
        assert_eq!(by_class.extract(&rated, &ctx).get("r"), Some(&FieldValue::Float(3.5)));

        let by_glyphs = field("r", vec![RuleSpec::new("span").normalize(Normalizer::RatingText)]);
        assert_eq!(by_glyphs.extract(&rated, &ctx).get("r"), Some(&FieldValue::Float(3.5)));

        let owner = Html::parse_fragment("<li data-owner-rating='9'></li><li data-owner-rating='0'></li>");
        let half = field(
            "r",
            vec![RuleSpec::new("li").attr("data-owner-rating").normalize(Normalizer::HalfOfInteger)],
        );
        assert_eq!(half.extract(&owner, &ctx).get("r"), Some(&FieldValue::Float(4.5)));

        let unrated = Html::parse_fragment("<li data-owner-rating='0'></li>");
        assert_eq!(half.extract(&unrated, &ctx).get("r"), Some(&FieldValue::NotFound));
    }

    #[test]
    fn test_unrated_owner_stops_the_chain() {
        let ctx = context();
        let owner = field(
            "r",
            vec![
                RuleSpec::new("[data-owner-rating]")
                    .attr("data-owner-rating")
                    .normalize(Normalizer::HalfOfInteger),
                RuleSpec::new("span").at(Position::Last).normalize(Normalizer::Stars),
            ],
        );

        let unrated = Html::parse_fragment("<li data-owner-rating='0'><span>★★★</span></li>");
        assert_eq!(owner.extract(&unrated, &ctx).get("r"), Some(&FieldValue::NotFound));

        let no_attr = Html::parse_fragment("<li><span>★★★</span></li>");
        assert_eq!(owner.extract(&no_attr, &ctx).get("r"), Some(&FieldValue::Float(3.0)));
    }

    #[test]
    fn test_date_from_link_and_urls() {
        let ctx = context();
        let doc = Html::parse_fragment(
            "<table><tbody><tr><td class='td-day'><a href='/dave/films/diary/for/2024/03/07/'>7</a></td>\
             <td><a href='/film/heat-1995/'>Heat</a></td></tr></tbody></table>",
        );
        let date = field("date", vec![RuleSpec::new("td.td-day a").attr("href").normalize(Normalizer::DateFromLink)]);
        assert_eq!(date.extract(&doc, &ctx).get("date"), Some(&FieldValue::text("2024-03-07")));

        let url = field("url", vec![RuleSpec::new("a[href*='/film/']").attr("href").normalize(Normalizer::AbsoluteUrl)]);
        assert_eq!(
            url.extract(&doc, &ctx).get("url"),
            Some(&FieldValue::text("https://letterboxd.com/film/heat-1995/"))
        );
    }

    #[test]
    fn test_default_rule_sets_compile() {
        let config = ParsingConfig::default();
        for spec in [
            &config.list_item,
            &config.diary_item,
            &config.film_detail,
            &config.film_stats,
            &config.rating_histogram,
            &config.diary_enrichment,
        ] {
            assert!(RuleSet::compile(spec).is_ok(), "rule set {} failed to compile", spec.name);
        }
    }
}
