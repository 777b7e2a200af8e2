//! User service
//!
//! Implements business logic for accounts:
//! - Registration of a user together with its profile
//! - Credential authentication
//! - Lookups by ID and username

use crate::db::is_unique_violation;
use crate::db::repositories::UserRepository;
use crate::models::{User, UserProfile, USERNAME_MAX_LENGTH};
use crate::services::page::{is_valid_url, normalize_url};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Letters, digits and `@.+-_`
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Validation error on a named field
    #[error("{field}: {message}")]
    ValidationError { field: &'static str, message: String },

    /// Username already taken
    #[error("A user with that username already exists.")]
    UserExists(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl UserServiceError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field,
            message: message.into(),
        }
    }
}

/// Input for user registration
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub website: Option<String>,
    /// Stored picture path, relative to the media directory
    pub picture: Option<String>,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }
}

/// User service for registration and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Register a new user and create its profile.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a bad username, email, password or website
    /// - `UserExists` if the username is already taken
    /// - `InternalError` for database errors
    pub async fn register(
        &self,
        input: RegisterInput,
    ) -> Result<(User, UserProfile), UserServiceError> {
        let username = validate_username(&input.username)?;
        let email = validate_email(&input.email)?;
        if input.password.is_empty() {
            return Err(UserServiceError::invalid("password", "This field is required."));
        }
        let website = match input.website.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(validate_website(raw)?),
        };

        if self
            .user_repo
            .exists_by_username(&username)
            .await
            .context("Failed to check username")?
        {
            return Err(UserServiceError::UserExists(username));
        }

        let password = input.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("Password hashing task failed")?
            .context("Failed to hash password")?;

        let user = User::new(username, email, password_hash);
        let profile = UserProfile::new(0, website, input.picture);
        // The username may have been taken since the check above
        let created = self.user_repo.create_with_profile(&user, &profile).await;
        let (user, profile) = match created {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => {
                return Err(UserServiceError::UserExists(user.username))
            }
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        tracing::info!("Registered user {} (id {})", user.username, user.id);
        Ok((user, profile))
    }

    /// Check a username and password.
    ///
    /// Returns the user when the password matches, whether or not the account
    /// is active; `None` for an unknown user or a wrong password.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let user = match self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user")?
        {
            Some(user) => user,
            None => return Ok(None),
        };

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .context("Password verification task failed")?
            .context("Failed to verify password")?;

        Ok(valid.then_some(user))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user")?)
    }

    /// Get the profile of a user
    pub async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>, UserServiceError> {
        Ok(self
            .user_repo
            .get_profile(user_id)
            .await
            .context("Failed to get user profile")?)
    }

    /// Activate or deactivate an account
    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<(), UserServiceError> {
        self.user_repo
            .set_active(id, is_active)
            .await
            .context("Failed to update user")?;
        Ok(())
    }
}

/// Trimmed username, or the reason it is unacceptable
pub fn validate_username(username: &str) -> Result<String, UserServiceError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(UserServiceError::invalid("username", "This field is required."));
    }
    let len = username.chars().count();
    if len > USERNAME_MAX_LENGTH {
        return Err(UserServiceError::invalid(
            "username",
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                USERNAME_MAX_LENGTH, len
            ),
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(UserServiceError::invalid(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(username.to_string())
}

/// Trimmed email; empty is allowed, anything else needs an `@` between two parts
pub fn validate_email(email: &str) -> Result<String, UserServiceError> {
    let email = email.trim();
    if email.is_empty() {
        return Ok(String::new());
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace) =>
        {
            Ok(email.to_string())
        }
        _ => Err(UserServiceError::invalid("email", "Enter a valid email address.")),
    }
}

/// Normalised website URL
pub fn validate_website(website: &str) -> Result<String, UserServiceError> {
    let url = normalize_url(website.trim());
    if !is_valid_url(&url) {
        return Err(UserServiceError::invalid("website", "Enter a valid URL."));
    }
    Ok(url)
}
