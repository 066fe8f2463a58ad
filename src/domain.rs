//! Domain module - scraped values, records and crawl plans
//!
//! Everything here is free of I/O: rating glyphs, count parsing, the
//! schema-bound record type and page selection rules.

pub mod collection;
pub mod histogram;
pub mod pagination;
pub mod rating;
pub mod record;
pub mod schemas;
pub mod value_normalizer;

pub use collection::{CollectionPage, ItemFragment};
pub use histogram::{RatingHistogram, TOTAL_RATINGS_FIELD};
pub use pagination::{CollectionKind, PageSelection, PageSelectionError, page_url};
pub use rating::{HalfStars, InvalidRating, stars_to_value, value_to_stars};
pub use record::{FieldValue, Record, RecordPatch, Schema};
