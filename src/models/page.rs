//! Page model: an external link filed under a category

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a page title
pub const PAGE_TITLE_MAX_LENGTH: usize = 128;
/// Maximum length of a page URL
pub const PAGE_URL_MAX_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub url: String,
    pub views: i64,
    pub created_at: DateTime<Utc>,
}

impl Page {
    /// A new page always starts with zero views.
    pub fn new(category_id: i64, title: String, url: String) -> Self {
        Self {
            id: 0,
            category_id,
            title,
            url,
            views: 0,
            created_at: Utc::now(),
        }
    }
}
