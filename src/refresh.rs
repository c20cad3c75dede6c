use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::entry::EntryState;
use crate::error::CacheError;
use crate::tiers::memory::MemoryTier;
use crate::value::CachedValue;

/// Stale-while-refresh reads over a [`MemoryTier`].
///
/// Expired entries keep being served while exactly one caller refreshes them
/// in the background. Only a missing entry makes the caller wait for the
/// loader. How long an expired entry stays servable is the tier's
/// [`stale_retention`](crate::MemoryTierConfig::stale_retention); with none,
/// every expired entry reads as `NotFound`.
///
/// | entry state | result | loader |
/// |-------------|--------|--------|
/// | `NotFound`  | loaded value | called and awaited |
/// | `Actual`    | cached value | not called |
/// | `Stale`     | stale value  | spawned if this caller wins the loading lock |
/// | `Loading`   | stale value  | not called |
#[derive(Clone)]
pub struct StaleWhileRefresh {
    tier: Arc<MemoryTier>,
    ttl: Duration,
}

impl StaleWhileRefresh {
    /// # Arguments
    /// * `tier` - Tier holding the entries, possibly shared with a dispatcher
    /// * `ttl` - Time until a loaded value becomes stale
    pub fn new(tier: Arc<MemoryTier>, ttl: Duration) -> Self {
        StaleWhileRefresh { tier, ttl }
    }

    pub fn tier(&self) -> &Arc<MemoryTier> {
        &self.tier
    }

    /// Return the cached value or load it from origin.
    ///
    /// `load` receives the key. A stale refresh whose loader returns `None`
    /// (or panics) leaves the stale value in place for the next attempt.
    ///
    /// Fails only if the cached value is not a `V`.
    pub async fn get_or_refresh<V, F, Fut>(&self, key: &str, load: F) -> Result<Option<V>, CacheError>
    where
        V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let lookup = self.tier.lookup(key).await;

        match (lookup.state, lookup.value) {
            (EntryState::Actual, Some(value)) => Ok(Some(value.into_typed()?)),
            (EntryState::Stale, Some(value)) => {
                let stale = value.into_typed()?;
                if self.tier.try_begin_loading(key).await {
                    self.spawn_refresh(key, load);
                }
                Ok(Some(stale))
            }
            (EntryState::Loading, Some(value)) => Ok(Some(value.into_typed()?)),
            _ => {
                let loaded = load(key.to_string()).await;
                if let Some(value) = &loaded {
                    self.tier
                        .complete_loading(
                            key,
                            CachedValue::from_typed_with_serializer(value.clone()),
                            self.ttl,
                        )
                        .await;
                }
                Ok(loaded)
            }
        }
    }

    /// Refresh `key` in the background. The caller must hold the loading lock.
    fn spawn_refresh<V, F, Fut>(&self, key: &str, load: F)
    where
        V: Serialize + Send + Sync + 'static,
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let tier = self.tier.clone();
        let ttl = self.ttl;
        let key = key.to_string();

        tokio::spawn(async move {
            // The loader runs in its own task so a panic still releases the lock
            match tokio::spawn(load(key.clone())).await {
                Ok(Some(value)) => {
                    tier.complete_loading(&key, CachedValue::from_typed_with_serializer(value), ttl)
                        .await;
                    tracing::debug!("Refreshed stale entry: key={}", key);
                }
                Ok(None) => {
                    tier.abandon_loading(&key).await;
                    tracing::warn!("Refresh returned nothing, keeping stale value: key={}", key);
                }
                Err(e) => {
                    tier.abandon_loading(&key).await;
                    tracing::error!("Refresh failed: key={}, error={}", key, e);
                }
            }
        });
    }
}
