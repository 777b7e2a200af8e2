//! Page repository
//!
//! - `PageRepository` trait defining the interface for page data access
//! - `SqlxPageRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::Page;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Page repository trait
#[async_trait]
pub trait PageRepository: Send + Sync {
    /// Insert a page, returning it with its assigned ID
    async fn create(&self, page: &Page) -> Result<Page>;

    /// Pages of one category, most viewed first, ties by title
    async fn list_by_category(&self, category_id: i64) -> Result<Vec<Page>>;

    /// The `limit` most viewed pages across all categories
    async fn list_top_by_views(&self, limit: i64) -> Result<Vec<Page>>;

    /// Overwrite the view counter
    async fn update_views(&self, id: i64, views: i64) -> Result<()>;
}

/// SQLx-based page repository implementation
pub struct SqlxPageRepository {
    pool: DynDatabasePool,
}

impl SqlxPageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PageRepository for SqlxPageRepository {
    async fn create(&self, page: &Page) -> Result<Page> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(sqlite_pool(&self.pool)?, page).await,
            DatabaseDriver::Mysql => create_mysql(mysql_pool(&self.pool)?, page).await,
        }
    }

    async fn list_by_category(&self, category_id: i64) -> Result<Vec<Page>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_category_sqlite(sqlite_pool(&self.pool)?, category_id).await
            }
            DatabaseDriver::Mysql => {
                list_by_category_mysql(mysql_pool(&self.pool)?, category_id).await
            }
        }
    }

    async fn list_top_by_views(&self, limit: i64) -> Result<Vec<Page>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_top_by_views_sqlite(sqlite_pool(&self.pool)?, limit).await,
            DatabaseDriver::Mysql => list_top_by_views_mysql(mysql_pool(&self.pool)?, limit).await,
        }
    }

    async fn update_views(&self, id: i64, views: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_views_sqlite(sqlite_pool(&self.pool)?, id, views).await,
            DatabaseDriver::Mysql => update_views_mysql(mysql_pool(&self.pool)?, id, views).await,
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, category_id, title, url, views, created_at FROM pages";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, page: &Page) -> Result<Page> {
    let result = sqlx::query(
        "INSERT INTO pages (category_id, title, url, views, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(page.category_id)
    .bind(&page.title)
    .bind(&page.url)
    .bind(page.views)
    .bind(page.created_at)
    .execute(pool)
    .await
    .context("Failed to create page")?;

    Ok(Page {
        id: result.last_insert_rowid(),
        ..page.clone()
    })
}

async fn list_by_category_sqlite(pool: &SqlitePool, category_id: i64) -> Result<Vec<Page>> {
    let rows = sqlx::query(&format!(
        "{} WHERE category_id = ? ORDER BY views DESC, title",
        SELECT_COLUMNS
    ))
    .bind(category_id)
    .fetch_all(pool)
    .await
    .context("Failed to list pages by category")?;

    Ok(rows.iter().map(row_to_page_sqlite).collect())
}

async fn list_top_by_views_sqlite(pool: &SqlitePool, limit: i64) -> Result<Vec<Page>> {
    let rows = sqlx::query(&format!("{} ORDER BY views DESC, title LIMIT ?", SELECT_COLUMNS))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list top pages")?;

    Ok(rows.iter().map(row_to_page_sqlite).collect())
}

async fn update_views_sqlite(pool: &SqlitePool, id: i64, views: i64) -> Result<()> {
    sqlx::query("UPDATE pages SET views = ? WHERE id = ?")
        .bind(views)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update page views")?;

    Ok(())
}

fn row_to_page_sqlite(row: &sqlx::sqlite::SqliteRow) -> Page {
    Page {
        id: row.get("id"),
        category_id: row.get("category_id"),
        title: row.get("title"),
        url: row.get("url"),
        views: row.get("views"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, page: &Page) -> Result<Page> {
    let result = sqlx::query(
        "INSERT INTO pages (category_id, title, url, views, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(page.category_id)
    .bind(&page.title)
    .bind(&page.url)
    .bind(page.views)
    .bind(page.created_at)
    .execute(pool)
    .await
    .context("Failed to create page")?;

    Ok(Page {
        id: result.last_insert_id() as i64,
        ..page.clone()
    })
}

async fn list_by_category_mysql(pool: &MySqlPool, category_id: i64) -> Result<Vec<Page>> {
    let rows = sqlx::query(&format!(
        "{} WHERE category_id = ? ORDER BY views DESC, title",
        SELECT_COLUMNS
    ))
    .bind(category_id)
    .fetch_all(pool)
    .await
    .context("Failed to list pages by category")?;

    Ok(rows.iter().map(row_to_page_mysql).collect())
}

async fn list_top_by_views_mysql(pool: &MySqlPool, limit: i64) -> Result<Vec<Page>> {
    let rows = sqlx::query(&format!("{} ORDER BY views DESC, title LIMIT ?", SELECT_COLUMNS))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list top pages")?;

    Ok(rows.iter().map(row_to_page_mysql).collect())
}

async fn update_views_mysql(pool: &MySqlPool, id: i64, views: i64) -> Result<()> {
    sqlx::query("UPDATE pages SET views = ? WHERE id = ?")
        .bind(views)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update page views")?;

    Ok(())
}

fn row_to_page_mysql(row: &sqlx::mysql::MySqlRow) -> Page {
    Page {
        id: row.get("id"),
        category_id: row.get("category_id"),
        title: row.get("title"),
        url: row.get("url"),
        views: row.get("views"),
        created_at: row.get("created_at"),
    }
}
