use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::entry::{Entry, EntryState};
use crate::error::CacheError;
use crate::invalidation::{InvalidationRules, glob_regex, invalidate_matching};
use crate::tier::CacheTier;
use crate::utils::{now_ms, rand_simple};
use crate::value::{CachedValue, StorageMode};

/// Configuration for eviction on set operations.
#[derive(Debug, Clone)]
pub struct EvictOnSetConfig {
    /// Provide a number between 0 and 1 to calculate whether eviction should run on each set.
    ///
    /// - `1.0` -> run eviction on every `set`
    /// - `0.5` -> run eviction on every 2nd `set` (on average)
    /// - `0.0` -> disable eviction
    pub frequency: f64,

    /// Remove items until the number of items in the map is lower than `max_items`.
    pub max_items: usize,
}

/// Configuration for MemoryTier.
#[derive(Debug, Clone, Default)]
pub struct MemoryTierConfig {
    /// Drop stale and surplus entries during `set` operations.
    pub evict_on_set: Option<EvictOnSetConfig>,

    /// How long an expired entry stays servable as stale (see
    /// [`StaleWhileRefresh`](crate::StaleWhileRefresh)). Reads past that window
    /// remove the entry.
    ///
    /// Zero (the default) removes expired entries on the next read.
    pub stale_retention: Duration,
}

/// Result of [`MemoryTier::lookup`].
#[derive(Debug, Clone)]
pub struct EntryLookup {
    pub state: EntryState,
    /// Present for every state but `NotFound`; stale values included.
    pub value: Option<CachedValue>,
}

/// Thread-safe in-memory tier using HashMap with RwLock.
///
/// Entries carry the [`EntryState`] machine, so besides the plain
/// [`CacheTier`] interface (which only reports fresh entries) the tier can
/// serve stale values while a single refresh runs. See
/// [`StaleWhileRefresh`](crate::StaleWhileRefresh).
pub struct MemoryTier {
    state: RwLock<HashMap<String, Arc<Entry>>>,
    evict_on_set: Option<EvictOnSetConfig>,
    stale_retention: Duration,
    invalidation: InvalidationRules,
}

impl MemoryTier {
    /// Create a new MemoryTier with the given configuration.
    pub fn new(config: MemoryTierConfig) -> Self {
        MemoryTier {
            state: RwLock::new(HashMap::new()),
            evict_on_set: config.evict_on_set,
            stale_retention: config.stale_retention,
            invalidation: InvalidationRules::default(),
        }
    }

    /// Enable pattern invalidation with the given rules.
    pub fn with_invalidation(mut self, rules: InvalidationRules) -> Self {
        self.invalidation = rules;
        self
    }

    /// Number of entries held, stale and not yet removed retired ones included.
    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.is_empty()
    }

    /// State and value of the entry for `key`, stale values included.
    ///
    /// A retired entry is removed and reported as `NotFound`.
    pub async fn lookup(&self, key: &str) -> EntryLookup {
        match self.live_entry(key).await {
            Some(entry) => EntryLookup {
                state: entry.state(),
                value: Some(entry.value().clone()),
            },
            None => EntryLookup {
                state: EntryState::NotFound,
                value: None,
            },
        }
    }

    /// Take the loading lock of a stale entry.
    ///
    /// Returns `false` if there is no entry, it is fresh, or another caller
    /// already refreshes it.
    pub async fn try_begin_loading(&self, key: &str) -> bool {
        let state = self.state.read().await;
        state
            .get(key)
            .is_some_and(|entry| entry.try_begin_loading())
    }

    /// Finish a refresh with a renewed value (`Loading -> Actual`).
    pub async fn complete_loading(&self, key: &str, value: CachedValue, ttl: Duration) {
        let entry = self.new_entry(value, ttl);
        let mut state = self.state.write().await;
        state.insert(key.to_string(), entry);
    }

    /// Give up a refresh; the stale value stays servable (`Loading -> Stale`).
    pub async fn abandon_loading(&self, key: &str) -> bool {
        let state = self.state.read().await;
        state.get(key).is_some_and(|entry| entry.abandon_loading())
    }

    fn new_entry(&self, value: CachedValue, ttl: Duration) -> Arc<Entry> {
        Arc::new(Entry::retained(value, ttl, self.stale_retention))
    }

    /// The entry for `key` unless it is retired. Retired entries are removed.
    async fn live_entry(&self, key: &str) -> Option<Arc<Entry>> {
        let now = now_ms();
        {
            let state = self.state.read().await;
            match state.get(key) {
                None => return None,
                Some(entry) if !entry.is_retired_at(now) => return Some(entry.clone()),
                Some(_) => {}
            }
        }

        // Re-check under the write lock; a writer may have replaced it
        let mut state = self.state.write().await;
        if state.get(key).is_some_and(|entry| entry.is_retired_at(now)) {
            state.remove(key);
        }
        None
    }

    /// Run eviction if configured and random check passes.
    async fn maybe_evict(&self) {
        let Some(ref config) = self.evict_on_set else {
            return;
        };

        if config.frequency <= 0.0 {
            return;
        }

        let should_evict = if config.frequency >= 1.0 {
            true
        } else {
            rand_simple() < config.frequency
        };

        if !should_evict {
            return;
        }

        let mut state = self.state.write().await;
        let now = now_ms();

        // Stale entries nobody is refreshing go first
        state.retain(|_, entry| entry.state_at(now) != EntryState::Stale);

        // If still over max_items, remove the entries closest to expiry
        if state.len() > config.max_items {
            let mut entries: Vec<_> = state
                .iter()
                .map(|(k, entry)| (k.clone(), entry.expires_at()))
                .collect();
            entries.sort_by_key(|(_, expires)| *expires);

            let to_remove = state.len() - config.max_items;
            for (key, _) in entries.into_iter().take(to_remove) {
                state.remove(&key);
            }
        }
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn storage_mode(&self) -> StorageMode {
        StorageMode::Typed
    }

    async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError> {
        let Some(entry) = self.live_entry(key).await else {
            return Ok(None);
        };

        if entry.state() != EntryState::Actual {
            return Ok(None);
        }

        Ok(Some(entry.value().clone()))
    }

    async fn set(&self, key: &str, value: CachedValue, ttl: Duration) -> Result<(), CacheError> {
        let entry = self.new_entry(value, ttl);
        {
            let mut state = self.state.write().await;
            state.insert(key.to_string(), entry);
        }

        self.maybe_evict().await;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), CacheError> {
        let mut state = self.state.write().await;

        for key in keys {
            state.remove(*key);
        }

        Ok(())
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let re = glob_regex(pattern)?;
        let state = self.state.read().await;
        Ok(state.keys().filter(|k| re.is_match(k)).cloned().collect())
    }

    fn supports_invalidation(&self) -> bool {
        !self.invalidation.is_empty()
    }

    async fn invalidate(&self, target: &(dyn Any + Send + Sync)) -> Result<usize, CacheError> {
        let patterns = self.invalidation.patterns_for(target);
        invalidate_matching(self, &patterns).await
    }
}
