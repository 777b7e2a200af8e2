//! Page service
//!
//! Pages are external links filed under a category. New pages always start
//! with zero views, and URLs without a scheme get `http://` prepended.

use crate::db::repositories::PageRepository;
use crate::models::{Page, PAGE_TITLE_MAX_LENGTH, PAGE_URL_MAX_LENGTH};
use anyhow::Context;
use std::sync::Arc;

/// Error types for page service operations
#[derive(Debug, thiserror::Error)]
pub enum PageServiceError {
    /// Validation error on a named field
    #[error("{field}: {message}")]
    ValidationError { field: &'static str, message: String },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl PageServiceError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field,
            message: message.into(),
        }
    }
}

/// Page service
pub struct PageService {
    repo: Arc<dyn PageRepository>,
}

impl PageService {
    pub fn new(repo: Arc<dyn PageRepository>) -> Self {
        Self { repo }
    }

    /// Add a page to a category.
    ///
    /// The title is trimmed and the URL normalised with [`normalize_url`]
    /// before length checks. New pages start with zero views.
    pub async fn create(
        &self,
        category_id: i64,
        title: &str,
        url: &str,
    ) -> Result<Page, PageServiceError> {
        let title = validate_title(title)?;
        let url = validate_url(url)?;

        let page = self
            .repo
            .create(&Page::new(category_id, title, url))
            .await
            .context("Failed to create page")?;

        tracing::info!("Added page {} to category {}", page.title, category_id);
        Ok(page)
    }

    /// Pages of a category, most viewed first
    pub async fn list_by_category(&self, category_id: i64) -> Result<Vec<Page>, PageServiceError> {
        Ok(self
            .repo
            .list_by_category(category_id)
            .await
            .context("Failed to list pages")?)
    }

    /// The `limit` most viewed pages
    pub async fn top_by_views(&self, limit: i64) -> Result<Vec<Page>, PageServiceError> {
        Ok(self
            .repo
            .list_top_by_views(limit)
            .await
            .context("Failed to list top pages")?)
    }

    /// Overwrite the view counter of a page
    pub async fn set_views(&self, id: i64, views: i64) -> Result<(), PageServiceError> {
        if views < 0 {
            return Err(PageServiceError::invalid("views", "Views cannot be negative."));
        }
        self.repo
            .update_views(id, views)
            .await
            .context("Failed to update page views")?;
        Ok(())
    }
}

/// Trimmed, non-empty title within the length limit
pub fn validate_title(title: &str) -> Result<String, PageServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PageServiceError::invalid("title", "This field is required."));
    }
    check_length("title", title, PAGE_TITLE_MAX_LENGTH)?;
    Ok(title.to_string())
}

/// Normalised URL within the length limit
pub fn validate_url(url: &str) -> Result<String, PageServiceError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(PageServiceError::invalid("url", "This field is required."));
    }
    let url = normalize_url(url);
    if !is_valid_url(&url) {
        return Err(PageServiceError::invalid("url", "Enter a valid URL."));
    }
    check_length("url", &url, PAGE_URL_MAX_LENGTH)?;
    Ok(url)
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), PageServiceError> {
    let len = value.chars().count();
    if len > max {
        return Err(PageServiceError::invalid(
            field,
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                max, len
            ),
        ));
    }
    Ok(())
}

/// Prepend `http://` to a URL that has neither an `http://` nor an `https://` scheme.
pub fn normalize_url(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Minimal shape check for a normalised URL: a scheme, a host with no
/// whitespace, and nothing else required.
pub fn is_valid_url(url: &str) -> bool {
    let rest = match url.split_once("://") {
        Some((_, rest)) => rest,
        None => return false,
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    !host.is_empty() && !url.chars().any(char::is_whitespace)
}
