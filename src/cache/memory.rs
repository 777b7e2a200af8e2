//! In-memory cache implementation using moka
//!
//! Values are stored as JSON so one cache can hold any serializable type.
//! Every entry expires after the cache-wide TTL.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Default TTL for cache entries (1 hour)
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// In-memory cache using moka
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, Arc<String>>,
    ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl MemoryCache {
    /// Create a cache holding up to 10,000 entries for one hour each
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_capacity_and_ttl(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache, ttl }
    }

    /// Time-to-live of every entry
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the current number of entries in the cache
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Process pending evictions and invalidations
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(json) => {
                let value =
                    serde_json::from_str(&json).context("Failed to deserialize cache value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        self.cache.insert(key.to_string(), Arc::new(json)).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    /// Delete every key starting with `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys {
            self.cache.invalidate(&key).await;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();

        cache.set("category:slug:python", &42i64).await.unwrap();

        let hit: Option<i64> = cache.get("category:slug:python").await.unwrap();
        assert_eq!(hit, Some(42));

        let miss: Option<i64> = cache.get("category:slug:django").await.unwrap();
        assert_eq!(miss, None);
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let cache = MemoryCache::new();
        cache.set("k", &"text".to_string()).await.unwrap();

        let result: Result<Option<i64>> = cache.get("k").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = MemoryCache::new();
        cache.set("category:id:1", &1i64).await.unwrap();
        cache.set("category:slug:python", &1i64).await.unwrap();
        cache.set("page:top", &1i64).await.unwrap();
        cache.sync().await;

        cache.delete_prefix("category:").await.unwrap();

        assert_eq!(cache.get::<i64>("category:id:1").await.unwrap(), None);
        assert_eq!(cache.get::<i64>("category:slug:python").await.unwrap(), None);
        assert_eq!(cache.get::<i64>("page:top").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();
        cache.set("a", &1i64).await.unwrap();
        cache.set("b", &2i64).await.unwrap();

        cache.clear().await.unwrap();

        assert_eq!(cache.get::<i64>("a").await.unwrap(), None);
        assert_eq!(cache.entry_count(), 0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            #[test]
            fn entries_expire_after_ttl(
                key in "[a-z]{1,10}",
                value in "[a-z]{1,100}"
            ) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let cache = MemoryCache::with_capacity_and_ttl(1000, Duration::from_millis(10));

                    cache.set(&key, &value).await.unwrap();
                    let fresh: Option<String> = cache.get(&key).await.unwrap();
                    prop_assert_eq!(fresh, Some(value.clone()));

                    tokio::time::sleep(Duration::from_millis(50)).await;
                    cache.sync().await;

                    let expired: Option<String> = cache.get(&key).await.unwrap();
                    prop_assert_eq!(expired, None);
                    Ok(())
                })?;
            }
        }
    }
}
