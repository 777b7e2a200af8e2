//! Session model
//!
//! A server-side session: a bag of string values keyed by a random token
//! carried in a cookie, optionally bound to an authenticated user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// String key/value access to per-session state.
///
/// Request handlers hand one of these to code that keeps state across
/// requests (e.g. the visit tracker) instead of exposing the whole session.
pub trait SessionData {
    /// Value stored under `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: String);
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Session ID (cookie token)
    pub id: String,
    /// Authenticated user, if any
    pub user_id: Option<i64>,
    /// Key/value data
    pub data: BTreeMap<String, String>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty anonymous session
    pub fn new(id: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: None,
            data: BTreeMap::new(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

impl SessionData for Session {
    fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.data.insert(key.to_string(), value);
    }
}

impl SessionData for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }
}
