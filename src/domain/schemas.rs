//! Output schemas and their column names

use super::histogram::{RatingHistogram, TOTAL_RATINGS_FIELD};
use super::record::Schema;

pub mod film {
    pub const TITLE: &str = "Film_title";
    pub const RELEASE_YEAR: &str = "Release_year";
    pub const DIRECTOR: &str = "Director";
    pub const CAST: &str = "Cast";
    pub const AVERAGE_RATING: &str = "Average_rating";
    pub const OWNER_RATING: &str = "Owner_rating";
    pub const GENRES: &str = "Genres";
    pub const RUNTIME: &str = "Runtime";
    pub const COUNTRIES: &str = "Countries";
    pub const ORIGINAL_LANGUAGE: &str = "Original_language";
    pub const SPOKEN_LANGUAGES: &str = "Spoken_languages";
    pub const DESCRIPTION: &str = "Description";
    pub const STUDIOS: &str = "Studios";
    pub const WATCHES: &str = "Watches";
    pub const LIST_APPEARANCES: &str = "List_appearances";
    pub const LIKES: &str = "Likes";
    pub const FANS: &str = "Fans";
    pub const FILM_URL: &str = "Film_URL";
    pub const LIST_URL: &str = "List_URL";
}

pub mod diary {
    pub const DATE: &str = "date";
    pub const FILM_TITLE: &str = "film_title";
    pub const YEAR: &str = "year";
    pub const RATING: &str = "rating";
    pub const REVIEW: &str = "review";
    pub const FILM_URL: &str = "film_url";
    pub const DIRECTOR: &str = "director";
}

/// Columns of a structured diary dump after normalization
pub const DIARY_DUMP_FIELDS: [&str; 10] = [
    "name", "slug", "id", "release", "runtime", "rewatched", "rating", "liked", "reviewed", "date",
];

/// One row per film on a list, enriched from the film's own pages
pub fn film_schema() -> Schema {
    let mut fields: Vec<String> = [
        film::TITLE,
        film::RELEASE_YEAR,
        film::DIRECTOR,
        film::CAST,
        film::AVERAGE_RATING,
        film::OWNER_RATING,
        film::GENRES,
        film::RUNTIME,
        film::COUNTRIES,
        film::ORIGINAL_LANGUAGE,
        film::SPOKEN_LANGUAGES,
        film::DESCRIPTION,
        film::STUDIOS,
        film::WATCHES,
        film::LIST_APPEARANCES,
        film::LIKES,
        film::FANS,
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    fields.extend(RatingHistogram::column_names());
    fields.push(TOTAL_RATINGS_FIELD.to_string());
    fields.push(film::FILM_URL.to_string());
    Schema::new("film", fields)
}

/// One row per diary entry scraped from diary pages
pub fn diary_schema() -> Schema {
    Schema::new(
        "diary",
        [
            diary::DATE,
            diary::FILM_TITLE,
            diary::YEAR,
            diary::RATING,
            diary::REVIEW,
            diary::FILM_URL,
            diary::DIRECTOR,
        ],
    )
}

pub fn diary_dump_schema() -> Schema {
    Schema::new("diary_dump", DIARY_DUMP_FIELDS)
}
