//! Parsing configuration for Letterboxd pages
//!
//! Every field is declared as an ordered chain of rules. Chains list the
//! current site layout first and older layouts after it, so a layout change
//! can be absorbed by prepending a rule here or in the config file.

use serde::{Deserialize, Serialize};

use crate::domain::FieldValue;
use crate::domain::schemas::{diary, film};
use crate::infrastructure::config::letterboxd;

/// How a value is read from a matched element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Accessor {
    /// Full descendant text of the element at `position`
    #[default]
    Text,
    /// First child text node of the element at `position`
    OwnText,
    /// Attribute value of the element at `position`
    Attr { name: String },
    /// Descendant text of every matched element
    AllText,
    /// First child text node of every matched element
    AllOwnText,
}

/// Which of the matched elements an accessor reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    First,
    Last,
    Nth(usize),
}

/// Conversion applied to the accessed text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalizer {
    /// Non-blank trimmed text
    #[default]
    Trimmed,
    /// First digit run
    Integer,
    /// First digit run, zero rejected
    Year,
    /// All digit runs concatenated
    Digits,
    /// `1.2K` style counts
    CompactNumber,
    /// Float parsed from the first `len` characters
    FloatPrefix { len: usize },
    /// Star glyphs to a numeric rating
    Stars,
    /// Numeric or star-glyph rating, raw text kept otherwise
    RatingText,
    /// Integer half-star count to a rating, zero meaning unrated
    HalfOfInteger,
    /// `rated-N` class name to a rating
    RatedClass,
    /// Text with surrounding parentheses removed
    StripParens,
    /// Href resolved against the site base URL
    AbsoluteUrl,
    /// ISO date built from a `/YYYY/MM/DD/` link
    DateFromLink,
    /// Collected element texts
    List {
        #[serde(default)]
        exclude: Vec<String>,
        #[serde(default)]
        dedup: bool,
        #[serde(default)]
        non_empty: bool,
    },
    /// First non-blank element text
    FirstItem,
}

impl Normalizer {
    pub fn list() -> Self {
        Self::List {
            exclude: Vec::new(),
            dedup: false,
            non_empty: false,
        }
    }
}

/// One selector with its accessor and normalizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub selector: String,
    #[serde(default)]
    pub accessor: Accessor,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub normalizer: Normalizer,
}

impl RuleSpec {
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            accessor: Accessor::Text,
            position: Position::First,
            normalizer: Normalizer::Trimmed,
        }
    }

    pub fn attr(mut self, name: &str) -> Self {
        self.accessor = Accessor::Attr { name: name.to_string() };
        self
    }

    pub fn all_text(mut self) -> Self {
        self.accessor = Accessor::AllText;
        self
    }

    pub fn all_own_text(mut self) -> Self {
        self.accessor = Accessor::AllOwnText;
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn normalize(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }
}

/// Fallback chain for a single output field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: String,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Stored when no rule succeeds
    #[serde(default)]
    pub fallback: FieldValue,
}

impl FieldSpec {
    pub fn new(field: &str, rules: Vec<RuleSpec>) -> Self {
        Self {
            field: field.to_string(),
            rules,
            fallback: FieldValue::NotFound,
        }
    }

    pub fn with_fallback(mut self, fallback: FieldValue) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Named group of field chains applied to one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetSpec {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

/// Complete parsing configuration
///
/// Keys left out of a config file keep their built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Base URL for resolving relative links
    pub base_url: String,

    /// Item containers on list pages
    pub list_item_selectors: Vec<String>,

    /// Item containers on diary pages
    pub diary_item_selectors: Vec<String>,

    /// Next-page link on collection pages
    pub next_page_selectors: Vec<String>,

    /// Bars of the rating histogram fragment
    pub histogram_bar_selectors: Vec<String>,

    pub list_item: RuleSetSpec,
    pub diary_item: RuleSetSpec,
    pub film_detail: RuleSetSpec,
    pub film_stats: RuleSetSpec,
    pub rating_histogram: RuleSetSpec,

    /// Extra fields pulled from a film page for diary entries
    pub diary_enrichment: RuleSetSpec,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            base_url: letterboxd::BASE_URL.to_string(),
            list_item_selectors: strings(&[
                "ul.js-list-entries li.posteritem",
                "ul.poster-list li",
                "ul.list-entries li",
                "section.poster-list li",
            ]),
            diary_item_selectors: strings(&[
                "tr.diary-entry-row",
                "li.diary-entry",
                "div.diary-entry",
                "article.diary-entry",
                "li.entry",
                "article",
            ]),
            next_page_selectors: strings(&["a.next", "a[rel='next']"]),
            histogram_bar_selectors: strings(&["li.rating-histogram-bar"]),
            list_item: list_item_rules(),
            diary_item: diary_item_rules(),
            film_detail: film_detail_rules(),
            film_stats: film_stats_rules(),
            rating_histogram: rating_histogram_rules(),
            diary_enrichment: diary_enrichment_rules(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn list_item_rules() -> RuleSetSpec {
    RuleSetSpec {
        name: "list_item".to_string(),
        fields: vec![
            FieldSpec::new(
                film::FILM_URL,
                vec![
                    RuleSpec::new("[data-item-link]").attr("data-item-link").normalize(Normalizer::AbsoluteUrl),
                    RuleSpec::new("div[data-target-link]")
                        .attr("data-target-link")
                        .normalize(Normalizer::AbsoluteUrl),
                    RuleSpec::new("a[href*='/film/']").attr("href").normalize(Normalizer::AbsoluteUrl),
                ],
            ),
            FieldSpec::new(
                film::OWNER_RATING,
                vec![
                    RuleSpec::new("[data-owner-rating]")
                        .attr("data-owner-rating")
                        .normalize(Normalizer::HalfOfInteger),
                    RuleSpec::new("span").at(Position::Last).normalize(Normalizer::Stars),
                    RuleSpec::new("span.rating").attr("class").normalize(Normalizer::RatedClass),
                ],
            ),
        ],
    }
}

fn diary_item_rules() -> RuleSetSpec {
    RuleSetSpec {
        name: "diary_item".to_string(),
        fields: vec![
            FieldSpec::new(
                diary::DATE,
                vec![
                    RuleSpec::new("td.td-day a").attr("href").normalize(Normalizer::DateFromLink),
                    RuleSpec::new("[class*='entry-dates']"),
                    RuleSpec::new("time"),
                    RuleSpec::new("span.date"),
                ],
            ),
            FieldSpec::new(
                diary::FILM_TITLE,
                vec![
                    RuleSpec::new("td.td-film-details h3 a"),
                    RuleSpec::new("h3.headline-3 a"),
                    RuleSpec::new("a[href]"),
                ],
            ),
            FieldSpec::new(
                diary::YEAR,
                vec![
                    RuleSpec::new("td.td-released").normalize(Normalizer::StripParens),
                    RuleSpec::new("small.year").normalize(Normalizer::StripParens),
                    RuleSpec::new("span.film-year").normalize(Normalizer::StripParens),
                ],
            ),
            FieldSpec::new(
                diary::RATING,
                vec![
                    RuleSpec::new("[data-rating]").attr("data-rating").normalize(Normalizer::RatingText),
                    RuleSpec::new("span.rating[class*='rated-']")
                        .attr("class")
                        .normalize(Normalizer::RatedClass),
                    RuleSpec::new(".rating, .film-rating, .diary-rating").normalize(Normalizer::RatingText),
                ],
            ),
            FieldSpec::new(diary::REVIEW, vec![RuleSpec::new("p")]),
            FieldSpec::new(
                diary::FILM_URL,
                vec![
                    RuleSpec::new("td.td-film-details h3 a").attr("href").normalize(Normalizer::AbsoluteUrl),
                    RuleSpec::new("[data-film-link]").attr("data-film-link").normalize(Normalizer::AbsoluteUrl),
                    RuleSpec::new("a[href]").attr("href").normalize(Normalizer::AbsoluteUrl),
                ],
            ),
            FieldSpec::new(diary::DIRECTOR, Vec::new()),
        ],
    }
}

fn tab_details_links(fragment: &str) -> String {
    format!("#tab-details a[href*='{fragment}']")
}

fn film_detail_rules() -> RuleSetSpec {
    RuleSetSpec {
        name: "film_detail".to_string(),
        fields: vec![
            FieldSpec::new(
                film::TITLE,
                vec![
                    RuleSpec::new("h1.primaryname span.name"),
                    RuleSpec::new("div.col-17 h1"),
                    RuleSpec::new("meta[property='og:title']").attr("content"),
                ],
            ),
            FieldSpec::new(
                film::RELEASE_YEAR,
                vec![
                    RuleSpec::new("span.releasedate a").normalize(Normalizer::Year),
                    RuleSpec::new("div.releaseyear a")
                        .at(Position::Nth(1))
                        .normalize(Normalizer::Year),
                    RuleSpec::new("small.number a").normalize(Normalizer::Year),
                ],
            ),
            FieldSpec::new(
                film::DIRECTOR,
                vec![RuleSpec::new("meta[name='twitter:data1']").attr("content")],
            ),
            FieldSpec::new(
                film::CAST,
                vec![
                    RuleSpec::new("#tab-cast a").all_own_text().normalize(Normalizer::List {
                        exclude: strings(&["Show All…", "Show All..."]),
                        dedup: false,
                        non_empty: true,
                    }),
                ],
            ),
            FieldSpec::new(
                film::AVERAGE_RATING,
                vec![
                    RuleSpec::new("meta[name='twitter:data2']")
                        .attr("content")
                        .normalize(Normalizer::FloatPrefix { len: 4 }),
                ],
            ),
            FieldSpec::new(
                film::GENRES,
                vec![
                    RuleSpec::new("#tab-genres a.text-slug[href*='/genre/']")
                        .all_text()
                        .normalize(Normalizer::List {
                            exclude: Vec::new(),
                            dedup: true,
                            non_empty: true,
                        }),
                    RuleSpec::new("div.text-sluglist.capitalize a.text-slug")
                        .all_text()
                        .normalize(Normalizer::list()),
                ],
            ),
            FieldSpec::new(
                film::RUNTIME,
                vec![RuleSpec::new("p.text-link.text-footer").normalize(Normalizer::Integer)],
            ),
            FieldSpec::new(
                film::COUNTRIES,
                vec![RuleSpec::new(&tab_details_links("country")).all_own_text().normalize(Normalizer::List {
                    exclude: Vec::new(),
                    dedup: false,
                    non_empty: true,
                })],
            ),
            FieldSpec::new(
                film::ORIGINAL_LANGUAGE,
                vec![
                    RuleSpec::new(&tab_details_links("language"))
                        .all_own_text()
                        .normalize(Normalizer::FirstItem),
                ],
            ),
            FieldSpec::new(
                film::SPOKEN_LANGUAGES,
                vec![RuleSpec::new(&tab_details_links("language")).all_own_text().normalize(Normalizer::List {
                    exclude: Vec::new(),
                    dedup: true,
                    non_empty: true,
                })],
            ),
            FieldSpec::new(
                film::DESCRIPTION,
                vec![
                    RuleSpec::new("meta[name='description']").attr("content"),
                    RuleSpec::new("meta[property='og:description']").attr("content"),
                ],
            ),
            FieldSpec::new(
                film::STUDIOS,
                vec![RuleSpec::new(&tab_details_links("studio")).all_own_text().normalize(Normalizer::List {
                    exclude: Vec::new(),
                    dedup: false,
                    non_empty: true,
                })],
            ),
        ],
    }
}

fn film_stats_rules() -> RuleSetSpec {
    let stat = |field: &str, modern: &str, legacy: &str| {
        FieldSpec::new(
            field,
            vec![
                RuleSpec::new(modern).attr("aria-label").normalize(Normalizer::Digits),
                RuleSpec::new(modern).normalize(Normalizer::CompactNumber),
                RuleSpec::new(legacy).attr("title").normalize(Normalizer::Digits),
            ],
        )
    };

    RuleSetSpec {
        name: "film_stats".to_string(),
        fields: vec![
            stat(film::WATCHES, "div.production-statistic.-watches", "a.has-icon.icon-watched"),
            stat(film::LIST_APPEARANCES, "div.production-statistic.-lists", "a.has-icon.icon-list"),
            stat(film::LIKES, "div.production-statistic.-likes", "a.has-icon.icon-like"),
        ],
    }
}

fn rating_histogram_rules() -> RuleSetSpec {
    RuleSetSpec {
        name: "rating_histogram".to_string(),
        fields: vec![
            FieldSpec::new(
                film::FANS,
                vec![
                    RuleSpec::new("a.all-link.more-link").normalize(Normalizer::CompactNumber),
                    RuleSpec::new("a.all-link").normalize(Normalizer::CompactNumber),
                ],
            )
            .with_fallback(FieldValue::Integer(0)),
        ],
    }
}

fn diary_enrichment_rules() -> RuleSetSpec {
    RuleSetSpec {
        name: "diary_enrichment".to_string(),
        fields: vec![FieldSpec::new(
            diary::DIRECTOR,
            vec![RuleSpec::new("meta[name='twitter:data1']").attr("content")],
        )],
    }
}
