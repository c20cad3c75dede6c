use async_trait::async_trait;
use std::any::Any;
use std::time::Duration;

use crate::error::CacheError;
use crate::value::{CachedValue, StorageMode};

/// A tier is one backing store in the dispatcher's ordered chain.
///
/// Tiers are type-agnostic and work with [`CachedValue`], which holds either a
/// shared typed value (in-process tiers) or a JSON document (remote tiers).
/// Keys arrive already versioned; tiers store them verbatim.
///
/// The tier implementation is responsible for expiring values once their TTL
/// has passed.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// A name for logs and metrics.
    ///
    /// # Example
    /// - "memory"
    /// - "moka"
    /// - "redis"
    fn name(&self) -> &'static str;

    /// Returns the storage mode preference for this tier.
    ///
    /// Default implementation returns `Serialized` for safety.
    fn storage_mode(&self) -> StorageMode {
        StorageMode::Serialized
    }

    /// Return the cached value.
    ///
    /// The response must be `None` for misses and for expired values.
    async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError>;

    /// Store the value for `ttl`.
    async fn set(&self, key: &str, value: CachedValue, ttl: Duration) -> Result<(), CacheError>;

    /// Removes the key(s) from the tier.
    async fn remove(&self, keys: &[&str]) -> Result<(), CacheError>;

    /// List keys matching a Redis-style glob pattern.
    ///
    /// Only tiers taking part in pattern invalidation need to implement this.
    async fn keys_matching(&self, _pattern: &str) -> Result<Vec<String>, CacheError> {
        Err(CacheError::unsupported(self.name(), "keys_matching"))
    }

    /// Whether [`invalidate`](CacheTier::invalidate) does anything for this tier.
    fn supports_invalidation(&self) -> bool {
        false
    }

    /// Drop every entry related to `target`, returning how many keys were removed.
    async fn invalidate(&self, _target: &(dyn Any + Send + Sync)) -> Result<usize, CacheError> {
        Ok(0)
    }
}
