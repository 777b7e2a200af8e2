//! User and UserProfile models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a username
pub const USERNAME_MAX_LENGTH: usize = 150;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address, empty when not given
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Inactive accounts authenticate but may not log in
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active User.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Extra per-user data, one-to-one with `User`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    /// Personal website URL
    pub website: Option<String>,
    /// Path of the uploaded picture, relative to the media directory
    pub picture: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: i64, website: Option<String>, picture: Option<String>) -> Self {
        Self {
            id: 0,
            user_id,
            website,
            picture,
        }
    }

    /// Public URL of the picture, if any
    pub fn picture_url(&self) -> Option<String> {
        self.picture.as_ref().map(|p| format!("/media/{}", p))
    }
}
