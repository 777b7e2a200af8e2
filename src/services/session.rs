//! Session service
//!
//! Server-side sessions keyed by a random token. A fresh session lives only
//! in memory until something is stored in it; the web layer decides when to
//! persist.

use crate::config::MAX_SESSION_AGE_DAYS;
use crate::db::repositories::SessionRepository;
use crate::models::Session;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Session lifecycle management
pub struct SessionService {
    repo: Arc<dyn SessionRepository>,
    max_age: Duration,
}

impl SessionService {
    /// `max_age_days` is clamped to `1..=MAX_SESSION_AGE_DAYS`
    pub fn new(repo: Arc<dyn SessionRepository>, max_age_days: i64) -> Self {
        Self {
            repo,
            max_age: Duration::days(max_age_days.clamp(1, MAX_SESSION_AGE_DAYS)),
        }
    }

    /// How long a session lives after its last save
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Load a live session. Expired sessions are deleted and reported as absent.
    pub async fn load(&self, id: &str) -> Result<Option<Session>> {
        let session = match self.repo.get_by_id(id).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.repo
                .delete(id)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// A new, unsaved anonymous session
    pub fn new_session(&self) -> Session {
        Session::new(generate_session_id(), Utc::now() + self.max_age)
    }

    /// Persist the session, pushing its expiry `max_age` into the future
    pub async fn save(&self, session: &mut Session) -> Result<()> {
        session.expires_at = Utc::now() + self.max_age;
        self.repo.save(session).await
    }

    /// Move the session to a fresh ID, keeping its data.
    ///
    /// The old record is deleted; the caller saves the session under its new ID.
    pub async fn cycle(&self, session: &mut Session) -> Result<()> {
        let old_id = std::mem::replace(&mut session.id, generate_session_id());
        self.repo
            .delete(&old_id)
            .await
            .context("Failed to delete cycled session")?;
        Ok(())
    }

    /// Bind the session to a user under a fresh ID and save it
    pub async fn login(&self, session: &mut Session, user_id: i64) -> Result<()> {
        self.cycle(session).await?;
        session.user_id = Some(user_id);
        self.save(session).await
    }

    /// Delete the session and replace it with a new empty one
    pub async fn flush(&self, session: &mut Session) -> Result<()> {
        self.repo
            .delete(&session.id)
            .await
            .context("Failed to delete session")?;
        *session = self.new_session();
        Ok(())
    }

    /// Delete expired sessions, returning how many were removed
    pub async fn cleanup_expired(&self) -> Result<i64> {
        self.repo.delete_expired().await
    }
}

fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{SessionData, User, UserProfile};

    async fn setup() -> (DynDatabasePool, SessionService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = SessionService::new(SqlxSessionRepository::boxed(pool.clone()), 14);
        (pool, service)
    }

    async fn create_user(pool: &DynDatabasePool) -> i64 {
        let (user, _) = SqlxUserRepository::new(pool.clone())
            .create_with_profile(
                &User::new("leifos".to_string(), String::new(), "hash".to_string()),
                &UserProfile::new(0, None, None),
            )
            .await
            .unwrap();
        user.id
    }

    #[tokio::test]
    async fn test_max_age_is_clamped() {
        let (pool, _) = setup().await;
        let repo = SqlxSessionRepository::boxed(pool);

        let huge = SessionService::new(repo.clone(), i64::MAX);
        assert_eq!(huge.max_age(), Duration::days(MAX_SESSION_AGE_DAYS));
        assert!(huge.new_session().expires_at > Utc::now());

        let negative = SessionService::new(repo, -1);
        assert_eq!(negative.max_age(), Duration::days(1));
    }

    #[tokio::test]
    async fn test_new_session_is_not_persisted() {
        let (_, service) = setup().await;

        let session = service.new_session();
        assert_eq!(session.id.len(), 32);
        assert!(service.load(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (_, service) = setup().await;

        let mut session = service.new_session();
        session.set("visits", "2".to_string());
        service.save(&mut session).await.unwrap();

        let loaded = service.load(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.get("visits").as_deref(), Some("2"));
        assert!(loaded.expires_at > Utc::now() + Duration::days(13));
    }

    #[tokio::test]
    async fn test_expired_session_loads_as_none() {
        let (_, service) = setup().await;
        let mut session = service.new_session();
        session.expires_at = Utc::now() - Duration::seconds(1);
        service.repo.save(&session).await.unwrap();

        assert!(service.load(&session.id).await.unwrap().is_none());
        assert_eq!(service.cleanup_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_login_cycles_id_and_keeps_data() {
        let (pool, service) = setup().await;
        let user_id = create_user(&pool).await;

        let mut session = service.new_session();
        session.set("visits", "3".to_string());
        service.save(&mut session).await.unwrap();
        let old_id = session.id.clone();

        service.login(&mut session, user_id).await.unwrap();

        assert_ne!(session.id, old_id);
        assert!(service.load(&old_id).await.unwrap().is_none());
        let loaded = service.load(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, Some(user_id));
        assert_eq!(loaded.get("visits").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_flush_deletes_and_resets() {
        let (pool, service) = setup().await;
        let user_id = create_user(&pool).await;

        let mut session = service.new_session();
        service.login(&mut session, user_id).await.unwrap();
        let old_id = session.id.clone();

        service.flush(&mut session).await.unwrap();

        assert_ne!(session.id, old_id);
        assert!(session.user_id.is_none());
        assert!(session.data.is_empty());
        assert!(service.load(&old_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (_, service) = setup().await;
        let expired = SessionService::new(service.repo.clone(), -1);

        let mut a = expired.new_session();
        expired.save(&mut a).await.unwrap();
        let mut b = service.new_session();
        service.save(&mut b).await.unwrap();

        assert_eq!(service.cleanup_expired().await.unwrap(), 1);
        assert!(service.load(&b.id).await.unwrap().is_some());
    }
}
