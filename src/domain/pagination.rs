//! Page selection for collection crawls
//!
//! A crawl either follows next-page links from the first page until the chain
//! ends (`PageSelection::All`) or visits an explicit set of page numbers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of paginated collection being crawled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    List,
    Diary,
}

impl CollectionKind {
    /// Guess the kind from a collection URL (`/username/films/diary/` is a diary)
    pub fn detect(url: &str) -> Self {
        if url.split('/').any(|segment| segment == "diary") {
            Self::Diary
        } else {
            Self::List
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Diary => "diary",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = PageSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(Self::List),
            "diary" => Ok(Self::Diary),
            other => Err(PageSelectionError::UnknownKind(other.to_string())),
        }
    }
}

/// Upper bound on the pages an explicit selection may name
pub const MAX_SELECTED_PAGES: usize = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageSelectionError {
    #[error("invalid page token '{0}'")]
    InvalidToken(String),

    #[error("page numbers start at 1, got {0}")]
    ZeroPage(u32),

    #[error("descending page range {start}~{end}")]
    DescendingRange { start: u32, end: u32 },

    #[error("page range {start}~{end} selects more than {} pages", MAX_SELECTED_PAGES)]
    TooManyPages { start: u32, end: u32 },

    #[error("unknown collection kind '{0}'")]
    UnknownKind(String),
}

/// Which pages of a collection to visit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageSelection {
    /// Follow next-page links until the chain ends
    #[default]
    All,
    /// Visit exactly these pages, in this order
    Explicit(Vec<u32>),
}

impl PageSelection {
    pub fn explicit<I: IntoIterator<Item = u32>>(pages: I) -> Self {
        let mut seen = std::collections::HashSet::new();
        Self::Explicit(pages.into_iter().filter(|p| seen.insert(*p)).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Explicit(pages) => {
                let joined: Vec<String> = pages.iter().map(u32::to_string).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// Accepts `*`, page numbers and inclusive ranges separated by commas or
/// whitespace: `"1,3,5"`, `"2~4"`, `"1 4-6"`.
impl FromStr for PageSelection {
    type Err = PageSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::All);
        }

        let mut pages = Vec::new();
        for token in s.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty()) {
            match token.split_once(['~', '-']) {
                Some((start, end)) => {
                    let start = parse_page(start)?;
                    let end = parse_page(end)?;
                    if start > end {
                        return Err(PageSelectionError::DescendingRange { start, end });
                    }
                    let width = (end - start) as usize + 1;
                    if pages.len() + width > MAX_SELECTED_PAGES {
                        return Err(PageSelectionError::TooManyPages { start, end });
                    }
                    pages.extend(start..=end);
                }
                None => pages.push(parse_page(token)?),
            }
        }

        Ok(Self::explicit(pages))
    }
}

fn parse_page(token: &str) -> Result<u32, PageSelectionError> {
    let page: u32 = token
        .trim()
        .parse()
        .map_err(|_| PageSelectionError::InvalidToken(token.to_string()))?;
    if page == 0 {
        return Err(PageSelectionError::ZeroPage(page));
    }
    Ok(page)
}

/// URL of page `page` of a collection (`.../list/name/` → `.../list/name/page/3/`)
pub fn page_url(collection_url: &str, page: u32) -> String {
    format!("{}/page/{}/", collection_url.trim_end_matches('/'), page)
}
