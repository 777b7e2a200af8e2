//! Category repository
//!
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Insert a category, returning it with its assigned ID
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// All categories ordered by name
    async fn list(&self) -> Result<Vec<Category>>;

    /// The `limit` most liked categories
    async fn list_top_by_likes(&self, limit: i64) -> Result<Vec<Category>>;

    /// Check if a category name is taken (case-insensitive)
    async fn exists_by_name(&self, name: &str) -> Result<bool>;

    /// Check if a slug is taken
    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Overwrite the view and like counters
    async fn update_counters(&self, id: i64, views: i64, likes: i64) -> Result<()>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(sqlite_pool(&self.pool)?, category).await,
            DatabaseDriver::Mysql => create_mysql(mysql_pool(&self.pool)?, category).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_slug_sqlite(sqlite_pool(&self.pool)?, slug).await,
            DatabaseDriver::Mysql => get_by_slug_mysql(mysql_pool(&self.pool)?, slug).await,
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(sqlite_pool(&self.pool)?).await,
            DatabaseDriver::Mysql => list_mysql(mysql_pool(&self.pool)?).await,
        }
    }

    async fn list_top_by_likes(&self, limit: i64) -> Result<Vec<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_top_by_likes_sqlite(sqlite_pool(&self.pool)?, limit).await,
            DatabaseDriver::Mysql => list_top_by_likes_mysql(mysql_pool(&self.pool)?, limit).await,
        }
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => exists_by_name_sqlite(sqlite_pool(&self.pool)?, name).await,
            DatabaseDriver::Mysql => exists_by_name_mysql(mysql_pool(&self.pool)?, name).await,
        }
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => exists_by_slug_sqlite(sqlite_pool(&self.pool)?, slug).await,
            DatabaseDriver::Mysql => exists_by_slug_mysql(mysql_pool(&self.pool)?, slug).await,
        }
    }

    async fn update_counters(&self, id: i64, views: i64, likes: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_counters_sqlite(sqlite_pool(&self.pool)?, id, views, likes).await
            }
            DatabaseDriver::Mysql => {
                update_counters_mysql(mysql_pool(&self.pool)?, id, views, likes).await
            }
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, slug, views, likes, created_at FROM categories";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    let result = sqlx::query(
        "INSERT INTO categories (name, slug, views, likes, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&category.name)
    .bind(&category.slug)
    .bind(category.views)
    .bind(category.likes)
    .bind(category.created_at)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        ..category.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by ID")?;

    Ok(row.as_ref().map(row_to_category_sqlite))
}

async fn get_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query(&format!("{} WHERE slug = ?", SELECT_COLUMNS))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by slug")?;

    Ok(row.as_ref().map(row_to_category_sqlite))
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<Category>> {
    let rows = sqlx::query(&format!("{} ORDER BY name", SELECT_COLUMNS))
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;

    Ok(rows.iter().map(row_to_category_sqlite).collect())
}

async fn list_top_by_likes_sqlite(pool: &SqlitePool, limit: i64) -> Result<Vec<Category>> {
    let rows = sqlx::query(&format!("{} ORDER BY likes DESC, name LIMIT ?", SELECT_COLUMNS))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list top categories")?;

    Ok(rows.iter().map(row_to_category_sqlite).collect())
}

async fn exists_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE LOWER(name) = LOWER(?)")
        .bind(name)
        .fetch_one(pool)
        .await
        .context("Failed to check category name")?;

    Ok(count > 0)
}

async fn exists_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE slug = ?")
        .bind(slug)
        .fetch_one(pool)
        .await
        .context("Failed to check category slug")?;

    Ok(count > 0)
}

async fn update_counters_sqlite(pool: &SqlitePool, id: i64, views: i64, likes: i64) -> Result<()> {
    sqlx::query("UPDATE categories SET views = ?, likes = ? WHERE id = ?")
        .bind(views)
        .bind(likes)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update category counters")?;

    Ok(())
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        views: row.get("views"),
        likes: row.get("likes"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    let result = sqlx::query(
        "INSERT INTO categories (name, slug, views, likes, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&category.name)
    .bind(&category.slug)
    .bind(category.views)
    .bind(category.likes)
    .bind(category.created_at)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_id() as i64,
        ..category.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by ID")?;

    Ok(row.as_ref().map(row_to_category_mysql))
}

async fn get_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query(&format!("{} WHERE slug = ?", SELECT_COLUMNS))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by slug")?;

    Ok(row.as_ref().map(row_to_category_mysql))
}

async fn list_mysql(pool: &MySqlPool) -> Result<Vec<Category>> {
    let rows = sqlx::query(&format!("{} ORDER BY name", SELECT_COLUMNS))
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;

    Ok(rows.iter().map(row_to_category_mysql).collect())
}

async fn list_top_by_likes_mysql(pool: &MySqlPool, limit: i64) -> Result<Vec<Category>> {
    let rows = sqlx::query(&format!("{} ORDER BY likes DESC, name LIMIT ?", SELECT_COLUMNS))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list top categories")?;

    Ok(rows.iter().map(row_to_category_mysql).collect())
}

async fn exists_by_name_mysql(pool: &MySqlPool, name: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE LOWER(name) = LOWER(?)")
        .bind(name)
        .fetch_one(pool)
        .await
        .context("Failed to check category name")?;

    Ok(count > 0)
}

async fn exists_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE slug = ?")
        .bind(slug)
        .fetch_one(pool)
        .await
        .context("Failed to check category slug")?;

    Ok(count > 0)
}

async fn update_counters_mysql(pool: &MySqlPool, id: i64, views: i64, likes: i64) -> Result<()> {
    sqlx::query("UPDATE categories SET views = ?, likes = ? WHERE id = ?")
        .bind(views)
        .bind(likes)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update category counters")?;

    Ok(())
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        views: row.get("views"),
        likes: row.get("likes"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    async fn insert(repo: &SqlxCategoryRepository, name: &str, slug: &str, likes: i64) -> Category {
        let created = repo
            .create(&Category::new(name.to_string(), slug.to_string()))
            .await
            .expect("Failed to create category");
        repo.update_counters(created.id, 0, likes)
            .await
            .expect("Failed to set likes");
        Category { likes, ..created }
    }

    #[tokio::test]
    async fn test_create_and_get_category() {
        let repo = setup_test_repo().await;

        let created = insert(&repo, "Python", "python", 0).await;
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("not found");
        assert_eq!(by_id.name, "Python");

        let by_slug = repo.get_by_slug("python").await.unwrap().expect("not found");
        assert_eq!(by_slug.id, created.id);
    }

    #[tokio::test]
    async fn test_get_missing_category() {
        let repo = setup_test_repo().await;

        assert!(repo.get_by_id(42).await.unwrap().is_none());
        assert!(repo.get_by_slug("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_top_by_likes_orders_and_limits() {
        let repo = setup_test_repo().await;

        insert(&repo, "Python", "python", 64).await;
        insert(&repo, "Django", "django", 32).await;
        insert(&repo, "Other Frameworks", "other-frameworks", 16).await;
        insert(&repo, "Flask", "flask", 8).await;
        insert(&repo, "Bottle", "bottle", 4).await;
        insert(&repo, "Pyramid", "pyramid", 2).await;

        let top = repo.list_top_by_likes(5).await.unwrap();
        let names: Vec<&str> = top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Python", "Django", "Other Frameworks", "Flask", "Bottle"]);
    }

    #[tokio::test]
    async fn test_list_orders_by_name() {
        let repo = setup_test_repo().await;

        insert(&repo, "Python", "python", 0).await;
        insert(&repo, "Django", "django", 0).await;

        let all = repo.list().await.unwrap();
        assert_eq!(all[0].name, "Django");
        assert_eq!(all[1].name, "Python");
    }

    #[tokio::test]
    async fn test_exists_checks() {
        let repo = setup_test_repo().await;
        insert(&repo, "Python", "python", 0).await;

        assert!(repo.exists_by_name("Python").await.unwrap());
        assert!(repo.exists_by_name("python").await.unwrap());
        assert!(!repo.exists_by_name("Django").await.unwrap());
        assert!(repo.exists_by_slug("python").await.unwrap());
        assert!(!repo.exists_by_slug("django").await.unwrap());
    }
}
