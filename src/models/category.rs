//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a category name
pub const CATEGORY_NAME_MAX_LENGTH: usize = 128;

/// A named bucket of pages, addressed by its slug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Display name (unique)
    pub name: String,
    /// URL-friendly slug derived from the name (unique)
    pub slug: String,
    /// Number of times the category has been viewed
    pub views: i64,
    /// Number of likes
    pub likes: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Create a new Category with zeroed counters.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: 0,
            name,
            slug,
            views: 0,
            likes: 0,
            created_at: Utc::now(),
        }
    }

    /// Path of the category page
    pub fn url(&self) -> String {
        format!("/rango/category/{}/", self.slug)
    }
}
