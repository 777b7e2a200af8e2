//! Session repository
//!
//! Database operations for server-side sessions.
//!
//! This module provides:
//! - `SessionRepository` trait defining the interface for session data access
//! - `SqlxSessionRepository` implementing the trait for SQLite and MySQL
//!
//! Session data is stored as a JSON object in the `data` column.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert the session, or overwrite the stored row with the same ID
    async fn save(&self, session: &Session) -> Result<()>;

    /// Get session by ID (cookie token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<i64>;
}

/// SQLx-based session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn save(&self, session: &Session) -> Result<()> {
        let data = encode_data(&session.data)?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                save_session_sqlite(sqlite_pool(&self.pool)?, session, &data).await
            }
            DatabaseDriver::Mysql => {
                save_session_mysql(mysql_pool(&self.pool)?, session, &data).await
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_session_by_id_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_session_by_id_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_session_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => delete_session_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn delete_expired(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_expired_sessions_sqlite(sqlite_pool(&self.pool)?).await,
            DatabaseDriver::Mysql => delete_expired_sessions_mysql(mysql_pool(&self.pool)?).await,
        }
    }
}

fn encode_data(data: &BTreeMap<String, String>) -> Result<String> {
    serde_json::to_string(data).context("Failed to encode session data")
}

/// Corrupt session data decodes as an empty session rather than an error.
fn decode_data(id: &str, raw: &str) -> BTreeMap<String, String> {
    if raw.is_empty() {
        return BTreeMap::new();
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!("Discarding undecodable data for session {}: {}", truncate_id(id), e);
        BTreeMap::new()
    })
}

fn truncate_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn save_session_sqlite(pool: &SqlitePool, session: &Session, data: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, data, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            user_id = excluded.user_id,
            data = excluded.data,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(data)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to save session")?;

    Ok(())
}

async fn get_session_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, data, expires_at, created_at
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    Ok(row.map(|row| {
        let id: String = row.get("id");
        let raw: String = row.get("data");
        Session {
            data: decode_data(&id, &raw),
            id,
            user_id: row.get("user_id"),
            expires_at: row.get::<DateTime<Utc>, _>("expires_at"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        }
    }))
}

async fn delete_session_sqlite(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete session")?;

    Ok(())
}

async fn delete_expired_sessions_sqlite(pool: &SqlitePool) -> Result<i64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected() as i64)
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn save_session_mysql(pool: &MySqlPool, session: &Session, data: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, data, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            user_id = VALUES(user_id),
            data = VALUES(data),
            expires_at = VALUES(expires_at)
        "#,
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(data)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to save session")?;

    Ok(())
}

async fn get_session_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, data, expires_at, created_at
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    Ok(row.map(|row| {
        let id: String = row.get("id");
        let raw: String = row.get("data");
        Session {
            data: decode_data(&id, &raw),
            id,
            user_id: row.get("user_id"),
            expires_at: row.get::<DateTime<Utc>, _>("expires_at"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        }
    }))
}

async fn delete_session_mysql(pool: &MySqlPool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete session")?;

    Ok(())
}

async fn delete_expired_sessions_mysql(pool: &MySqlPool) -> Result<i64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected() as i64)
}
