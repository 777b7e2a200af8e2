//! User repository
//!
//! Database operations for users and their one-to-one profiles.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{User, UserProfile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user and its profile in one transaction
    async fn create_with_profile(
        &self,
        user: &User,
        profile: &UserProfile,
    ) -> Result<(User, UserProfile)>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Check if a username is taken
    async fn exists_by_username(&self, username: &str) -> Result<bool>;

    /// Activate or deactivate an account
    async fn set_active(&self, id: i64, is_active: bool) -> Result<()>;

    /// Get the profile belonging to a user
    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create_with_profile(
        &self,
        user: &User,
        profile: &UserProfile,
    ) -> Result<(User, UserProfile)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_with_profile_sqlite(sqlite_pool(&self.pool)?, user, profile).await
            }
            DatabaseDriver::Mysql => {
                create_with_profile_mysql(mysql_pool(&self.pool)?, user, profile).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_username_sqlite(sqlite_pool(&self.pool)?, username).await
            }
            DatabaseDriver::Mysql => {
                get_user_by_username_mysql(mysql_pool(&self.pool)?, username).await
            }
        }
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
                    .bind(username)
                    .fetch_one(sqlite_pool(&self.pool)?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
                    .bind(username)
                    .fetch_one(mysql_pool(&self.pool)?)
                    .await
            }
        }
        .context("Failed to check username")?;

        Ok(count > 0)
    }

    async fn set_active(&self, id: i64, is_active: bool) -> Result<()> {
        let now = chrono::Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
                    .bind(is_active)
                    .bind(now)
                    .bind(id)
                    .execute(sqlite_pool(&self.pool)?)
                    .await
                    .map(|_| ())
            }
            DatabaseDriver::Mysql => {
                sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
                    .bind(is_active)
                    .bind(now)
                    .bind(id)
                    .execute(mysql_pool(&self.pool)?)
                    .await
                    .map(|_| ())
            }
        }
        .context("Failed to update user status")
    }

    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_profile_sqlite(sqlite_pool(&self.pool)?, user_id).await,
            DatabaseDriver::Mysql => get_profile_mysql(mysql_pool(&self.pool)?, user_id).await,
        }
    }
}

const SELECT_USER: &str =
    "SELECT id, username, email, password_hash, is_active, created_at, updated_at FROM users";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_with_profile_sqlite(
    pool: &SqlitePool,
    user: &User,
    profile: &UserProfile,
) -> Result<(User, UserProfile)> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_active)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&mut *tx)
    .await
    .context("Failed to create user")?;
    let user_id = result.last_insert_rowid();

    let result = sqlx::query("INSERT INTO user_profiles (user_id, website, picture) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(&profile.website)
        .bind(&profile.picture)
        .execute(&mut *tx)
        .await
        .context("Failed to create user profile")?;
    let profile_id = result.last_insert_rowid();

    tx.commit().await.context("Failed to commit user")?;

    Ok((
        User {
            id: user_id,
            ..user.clone()
        },
        UserProfile {
            id: profile_id,
            user_id,
            ..profile.clone()
        },
    ))
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_USER))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    Ok(row.as_ref().map(row_to_user_sqlite))
}

async fn get_user_by_username_sqlite(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE username = ?", SELECT_USER))
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;

    Ok(row.as_ref().map(row_to_user_sqlite))
}

async fn get_profile_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Option<UserProfile>> {
    let row = sqlx::query("SELECT id, user_id, website, picture FROM user_profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user profile")?;

    Ok(row.map(|row| UserProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        website: row.get("website"),
        picture: row.get("picture"),
    }))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_with_profile_mysql(
    pool: &MySqlPool,
    user: &User,
    profile: &UserProfile,
) -> Result<(User, UserProfile)> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_active)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&mut *tx)
    .await
    .context("Failed to create user")?;
    let user_id = result.last_insert_id() as i64;

    let result = sqlx::query("INSERT INTO user_profiles (user_id, website, picture) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(&profile.website)
        .bind(&profile.picture)
        .execute(&mut *tx)
        .await
        .context("Failed to create user profile")?;
    let profile_id = result.last_insert_id() as i64;

    tx.commit().await.context("Failed to commit user")?;

    Ok((
        User {
            id: user_id,
            ..user.clone()
        },
        UserProfile {
            id: profile_id,
            user_id,
            ..profile.clone()
        },
    ))
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_USER))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    Ok(row.as_ref().map(row_to_user_mysql))
}

async fn get_user_by_username_mysql(pool: &MySqlPool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE username = ?", SELECT_USER))
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;

    Ok(row.as_ref().map(row_to_user_mysql))
}

async fn get_profile_mysql(pool: &MySqlPool, user_id: i64) -> Result<Option<UserProfile>> {
    let row = sqlx::query("SELECT id, user_id, website, picture FROM user_profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user profile")?;

    Ok(row.map(|row| UserProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        website: row.get("website"),
        picture: row.get("picture"),
    }))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
