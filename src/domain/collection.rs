//! Collection pages and the item fragments found on them

/// Markup for one list or diary entry, kept as owned HTML so that it can
/// cross await points and be re-parsed when extraction runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFragment {
    /// Page the item was found on (1-based)
    pub page_number: u32,
    /// Position on that page (0-based)
    pub index: usize,
    /// URL of the collection page
    pub page_url: String,
    /// Outer HTML of the item element
    pub html: String,
}

/// One fetched and parsed collection page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPage {
    pub url: String,
    pub page_number: u32,
    pub items: Vec<ItemFragment>,
    /// Absolute URL of the following page, when the page links one
    pub next_url: Option<String>,
}

impl CollectionPage {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
