//! Category service
//!
//! Implements business logic for categories:
//! - Creation with name validation and uniqueness checks
//! - Slug generation from name
//! - Cached lookups by ID and slug
//! - Top categories by likes for the index page

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::is_unique_violation;
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CATEGORY_NAME_MAX_LENGTH};
use anyhow::Context;
use std::sync::Arc;

/// Cache key prefixes
const CACHE_KEY_CATEGORY_BY_ID: &str = "category:id:";
const CACHE_KEY_CATEGORY_BY_SLUG: &str = "category:slug:";
const CACHE_KEY_PREFIX: &str = "category:";

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category name already exists
    #[error("Category with this Name already exists.")]
    DuplicateName(String),

    /// Another category already derives the same slug
    #[error("Category with this Slug already exists: {0}")]
    DuplicateSlug(String),

    /// Validation error
    #[error("{0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category service
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<MemoryCache>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { repo, cache }
    }

    /// Create a category from a display name.
    ///
    /// The name is trimmed and the slug derived with [`generate_slug`].
    ///
    /// # Errors
    /// - `ValidationError` for an empty, overlong or slug-less name
    /// - `DuplicateName` if the name is taken (case-insensitive)
    /// - `DuplicateSlug` if another name already produced the same slug
    pub async fn create(&self, name: &str) -> Result<Category, CategoryServiceError> {
        let name = validate_name(name)?;

        let slug = generate_slug(&name);
        if slug.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Category name must contain at least one letter or digit.".to_string(),
            ));
        }

        if self
            .repo
            .exists_by_name(&name)
            .await
            .context("Failed to check name uniqueness")?
        {
            return Err(CategoryServiceError::DuplicateName(name));
        }

        if self
            .repo
            .exists_by_slug(&slug)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(CategoryServiceError::DuplicateSlug(slug));
        }

        // A concurrent insert can still win between the checks and this write
        let created = match self.repo.create(&Category::new(name.clone(), slug.clone())).await {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => {
                // Equal names always derive equal slugs
                let existing = self
                    .repo
                    .get_by_slug(&slug)
                    .await
                    .context("Failed to load conflicting category")?;
                let same_name = existing.map_or(true, |c| c.name.eq_ignore_ascii_case(&name));
                return Err(if same_name {
                    CategoryServiceError::DuplicateName(name)
                } else {
                    CategoryServiceError::DuplicateSlug(slug)
                });
            }
            Err(e) => return Err(e.context("Failed to create category").into()),
        };

        tracing::info!("Created category {} ({})", created.name, created.slug);
        Ok(created)
    }

    /// Get category by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>, CategoryServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_CATEGORY_BY_ID, id);
        if let Some(category) = self.cache.get::<Category>(&cache_key).await.ok().flatten() {
            return Ok(Some(category));
        }

        let category = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category by ID")?;

        if let Some(ref cat) = category {
            let _ = self.cache.set(&cache_key, cat).await;
        }

        Ok(category)
    }

    /// Get category by slug
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, CategoryServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_CATEGORY_BY_SLUG, slug);
        if let Some(category) = self.cache.get::<Category>(&cache_key).await.ok().flatten() {
            return Ok(Some(category));
        }

        let category = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?;

        if let Some(ref cat) = category {
            let _ = self.cache.set(&cache_key, cat).await;
        }

        Ok(category)
    }

    /// The `limit` most liked categories
    pub async fn top_by_likes(&self, limit: i64) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self
            .repo
            .list_top_by_likes(limit)
            .await
            .context("Failed to list top categories")?)
    }

    /// All categories ordered by name
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self.repo.list().await.context("Failed to list categories")?)
    }

    /// Overwrite the view and like counters of a category
    pub async fn set_counters(
        &self,
        id: i64,
        views: i64,
        likes: i64,
    ) -> Result<(), CategoryServiceError> {
        if views < 0 || likes < 0 {
            return Err(CategoryServiceError::ValidationError(
                "Views and likes cannot be negative.".to_string(),
            ));
        }

        self.repo
            .update_counters(id, views, likes)
            .await
            .context("Failed to update category counters")?;
        self.invalidate_cache().await;
        Ok(())
    }

    async fn invalidate_cache(&self) {
        if let Err(e) = self.cache.delete_prefix(CACHE_KEY_PREFIX).await {
            tracing::warn!("Failed to invalidate category cache: {}", e);
        }
    }
}

/// Trimmed, non-empty name within the length limit
pub fn validate_name(name: &str) -> Result<String, CategoryServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "This field is required.".to_string(),
        ));
    }
    let len = name.chars().count();
    if len > CATEGORY_NAME_MAX_LENGTH {
        return Err(CategoryServiceError::ValidationError(format!(
            "Ensure this value has at most {} characters (it has {}).",
            CATEGORY_NAME_MAX_LENGTH, len
        )));
    }
    Ok(name.to_string())
}

/// Generate a URL-friendly slug from a name.
///
/// Lowercases, turns whitespace, underscores and ASCII punctuation into
/// single hyphens and trims hyphens from both ends. Non-ASCII letters are kept.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut prev_hyphen = true;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric()) {
            slug.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }

    slug.trim_end_matches('-').to_string()
}
