use async_trait::async_trait;
use moka::future::Cache;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use crate::entry::{Entry, EntryState};
use crate::error::CacheError;
use crate::invalidation::{InvalidationRules, glob_regex, invalidate_matching};
use crate::tier::CacheTier;
use crate::value::{CachedValue, StorageMode};

/// Configuration for MokaTier.
#[derive(Debug, Clone)]
pub struct MokaTierConfig {
    /// Maximum number of entries the cache can hold.
    pub max_capacity: u64,

    /// Upper bound on any entry's life, regardless of the TTL it was written with.
    /// `None` means only the per-write TTL applies.
    pub time_to_live: Option<Duration>,

    /// Time to idle: entries are expired if not accessed within this duration.
    /// `None` means entries don't expire based on idle time.
    pub time_to_idle: Option<Duration>,
}

impl Default for MokaTierConfig {
    fn default() -> Self {
        MokaTierConfig {
            max_capacity: 10_000,
            time_to_live: None,
            time_to_idle: None,
        }
    }
}

/// High-performance concurrent in-memory tier using Moka.
///
/// MokaTier provides:
/// - Lock-free concurrent access for reads and writes
/// - Automatic background eviction bounded by `max_capacity`
/// - Per-write TTLs, checked on read
///
/// Prefer it over [`MemoryTier`](crate::MemoryTier) for large caches under
/// high concurrency; it does not keep stale entries around.
pub struct MokaTier {
    cache: Cache<String, Arc<Entry>>,
    invalidation: InvalidationRules,
}

impl MokaTier {
    /// Create a new MokaTier with the given configuration.
    ///
    /// # Example
    /// ```ignore
    /// let config = MokaTierConfig {
    ///     max_capacity: 10_000,
    ///     time_to_live: Some(Duration::from_secs(300)),
    ///     time_to_idle: Some(Duration::from_secs(60)),
    /// };
    /// let tier = MokaTier::new(config);
    /// ```
    pub fn new(config: MokaTierConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);

        if let Some(ttl) = config.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        MokaTier {
            cache: builder.build(),
            invalidation: InvalidationRules::default(),
        }
    }

    /// Enable pattern invalidation with the given rules.
    pub fn with_invalidation(mut self, rules: InvalidationRules) -> Self {
        self.invalidation = rules;
        self
    }

    /// `(entry count, weighted size)` for monitoring.
    ///
    /// Moka updates both lazily, so recent writes may not be counted yet.
    pub fn stats(&self) -> (u64, u64) {
        let entry_count = self.cache.entry_count();
        let weighted_size = self.cache.weighted_size();
        (entry_count, weighted_size)
    }
}

#[async_trait]
impl CacheTier for MokaTier {
    fn name(&self) -> &'static str {
        "moka"
    }

    fn storage_mode(&self) -> StorageMode {
        StorageMode::Typed
    }

    async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError> {
        match self.cache.get(key).await {
            Some(entry) => {
                if entry.state() != EntryState::Actual {
                    // Entry is expired, remove it
                    self.cache.invalidate(key).await;
                    return Ok(None);
                }

                Ok(Some(entry.value().clone()))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: CachedValue, ttl: Duration) -> Result<(), CacheError> {
        // Moka handles eviction automatically based on capacity
        self.cache
            .insert(key.to_string(), Arc::new(Entry::new(value, ttl)))
            .await;

        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), CacheError> {
        for key in keys {
            self.cache.invalidate(*key).await;
        }

        Ok(())
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let re = glob_regex(pattern)?;
        Ok(self
            .cache
            .iter()
            .filter(|(key, _)| re.is_match(key.as_str()))
            .map(|(key, _)| key.to_string())
            .collect())
    }

    fn supports_invalidation(&self) -> bool {
        !self.invalidation.is_empty()
    }

    async fn invalidate(&self, target: &(dyn Any + Send + Sync)) -> Result<usize, CacheError> {
        let patterns = self.invalidation.patterns_for(target);
        invalidate_matching(self, &patterns).await
    }
}
