//! Cache layer
//!
//! In-process caching (moka) for hot lookups such as categories by slug.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rango::cache::{CacheLayer, MemoryCache};
//!
//! let cache = MemoryCache::new();
//! cache.set("key", &"value").await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

pub use memory::{MemoryCache, DEFAULT_TTL};

/// Cache layer trait
///
/// The generic methods make this trait unusable as `dyn CacheLayer`; services
/// hold a concrete cache type instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache, expiring after the cache's TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values whose key starts with `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}
