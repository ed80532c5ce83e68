use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A newspaper source with its full page collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Newspaper {
    /// Unique identifier for the newspaper
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// All active pages of this newspaper (two-level tree, flattened)
    pub pages: Vec<Page>,
}

/// A section of a newspaper site (front page, sports, a paginated archive...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Unique identifier for the page
    pub id: String,

    /// Newspaper this page belongs to
    pub newspaper_id: String,

    /// Parent page id (None for top-level pages)
    pub parent_page_id: Option<String>,

    /// Human-readable name
    pub name: String,

    /// Link template used to build the preview-page URL; pages without one
    /// are structural containers and are never fetched directly
    pub link_format: Option<String>,

    /// Whether the page is paginated (link template takes a page number)
    pub paginated: bool,
}

impl Page {
    /// A page with no parent is a top-level section
    pub fn is_top_level(&self) -> bool {
        self.parent_page_id.is_none()
    }

    /// Only pages with a link template can be fetched
    pub fn is_fetchable(&self) -> bool {
        self.link_format.is_some()
    }
}

/// An article discovered on a preview page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Identity of the article, derived from its canonical link
    pub id: String,

    /// Page the article was discovered on
    pub page_id: String,

    /// Absolute link to the full article
    pub link: String,

    /// Article title as shown on the preview page
    pub title: String,

    /// Preview payload (image link, publication date string, ...)
    pub preview: Value,

    /// Full article body (None until fetched)
    pub body: Option<String>,

    /// True once the body has been successfully fetched and stored
    pub downloaded: bool,
}

/// Append-only record of one preview-page fetch attempt that completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageParsingHistory {
    /// Page the record belongs to
    pub page_id: String,

    /// Page number that was requested
    pub page_number: i32,

    /// Number of newly inserted articles found at that page number
    pub article_count: i32,

    /// Creation timestamp; the most recent record is the pagination cursor
    pub created_at: DateTime<Utc>,
}
