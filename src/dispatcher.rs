use futures::future::join_all;
use serde::{Serialize, de::DeserializeOwned};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::builder::DispatcherBuilder;
use crate::descriptor::TierDescriptor;
use crate::error::CacheError;
use crate::value::CachedValue;
use crate::version::VersionProvider;
use crate::versioning::version_key;

/// Tier index and the TTL to write it with.
type WritePlan = Vec<(usize, Duration)>;

/// Outcome of [`CacheDispatcher::invalidate`].
#[derive(Debug, Default)]
pub struct InvalidationReport {
    /// Keys removed across all tiers.
    pub removed: usize,
    /// Tiers without invalidation support.
    pub skipped: Vec<String>,
    /// Tiers whose invalidation failed, with the error.
    pub failures: Vec<(String, CacheError)>,
}

impl InvalidationReport {
    /// True if no tier failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Versioned get/set/invalidate across an ordered list of tiers.
///
/// Reads walk the tiers in order, each bounded by its retrieval timeout, and
/// backfill the tiers that missed once a value turns up. Keys are versioned
/// with the current generation; a miss there falls back to the previous
/// generation and promotes what it finds.
///
/// Tier failures never reach the caller: a slow, failing or absent tier is a
/// miss on read and a logged error on write. Writes and backfills run as
/// detached tokio tasks, so every operation must be called from within a tokio
/// runtime.
///
/// Cloning is cheap; clones share the tiers.
#[derive(Clone)]
pub struct CacheDispatcher {
    tiers: Arc<[TierDescriptor]>,
    current: u32,
    previous: u32,
}

impl CacheDispatcher {
    /// Start building a dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Generations are read once here and stay fixed for the dispatcher's lifetime.
    pub(crate) fn new(tiers: Vec<TierDescriptor>, versions: Arc<dyn VersionProvider>) -> Self {
        let current = versions.current_generation();
        let previous = versions.previous_generation();
        CacheDispatcher {
            tiers: tiers.into(),
            current,
            previous,
        }
    }

    /// `(current, previous)` generations.
    pub fn generations(&self) -> (u32, u32) {
        (self.current, self.previous)
    }

    /// Tiers in lookup order.
    pub fn tiers(&self) -> &[TierDescriptor] {
        &self.tiers
    }

    /// Return the cached value for a logical key.
    ///
    /// Tries the current generation, then the previous one. A value found only
    /// under the previous generation is returned right away and re-stored under
    /// the current generation in the background.
    pub async fn get<V>(&self, key: &str) -> Option<V>
    where
        V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        if key.is_empty() {
            tracing::debug!("Ignoring get for empty key");
            return None;
        }

        let current_key = version_key(key, self.current);
        if let Some(value) = self.retrieve_from_tiers::<V>(&current_key).await {
            return Some(value);
        }

        let previous_key = version_key(key, self.previous);
        if previous_key == current_key {
            return None;
        }

        let value = self.retrieve_from_tiers::<V>(&previous_key).await?;

        tracing::debug!(
            "Promoting value to current generation: from={}, to={}",
            previous_key,
            current_key
        );
        self.spawn_write(
            self.write_plan(None),
            current_key,
            CachedValue::from_typed_with_serializer(value.clone()),
        );

        Some(value)
    }

    /// Store a value under the current generation without waiting for the writes.
    ///
    /// Every tier but the last is written with its own write TTL. The last tier
    /// uses `ttl` when given, else its own.
    pub fn set<V>(&self, key: &str, value: V, ttl: Option<Duration>)
    where
        V: Serialize + Send + Sync + 'static,
    {
        if key.is_empty() {
            tracing::warn!("Ignoring set for empty key");
            return;
        }
        if self.tiers.is_empty() {
            return;
        }

        self.spawn_write(
            self.write_plan(ttl),
            version_key(key, self.current),
            CachedValue::from_typed_with_serializer(value),
        );
    }

    /// Like [`set`](CacheDispatcher::set), but waits for every tier write.
    ///
    /// Returns how many tiers accepted the value; failures are only logged.
    pub async fn set_and_wait<V>(&self, key: &str, value: V, ttl: Option<Duration>) -> usize
    where
        V: Serialize + Send + Sync + 'static,
    {
        if key.is_empty() {
            tracing::warn!("Ignoring set for empty key");
            return 0;
        }

        write_to_tiers(
            &self.tiers,
            &self.write_plan(ttl),
            &version_key(key, self.current),
            &CachedValue::from_typed_with_serializer(value),
        )
        .await
    }

    /// Remove a logical key (current and previous generation) from every tier.
    pub async fn remove(&self, key: &str) {
        if key.is_empty() {
            return;
        }

        let current_key = version_key(key, self.current);
        let previous_key = version_key(key, self.previous);
        let mut keys = vec![current_key.as_str()];
        if previous_key != current_key {
            keys.push(previous_key.as_str());
        }

        let removals = self.tiers.iter().map(|descriptor| {
            let keys = &keys;
            async move {
                if let Err(e) = descriptor.tier().remove(keys).await {
                    tracing::error!(
                        "Failed to remove from tier: tier={}, keys={:?}, error={}",
                        descriptor.name(),
                        keys,
                        e
                    );
                }
            }
        });
        join_all(removals).await;
    }

    /// Ask every tier that supports invalidation to drop entries related to `target`.
    ///
    /// Tiers are invalidated concurrently. Failures are logged and collected in
    /// the report; the call itself always completes.
    pub async fn invalidate(&self, target: &(dyn Any + Send + Sync)) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        let mut pending = Vec::new();

        for descriptor in self.tiers.iter() {
            if !descriptor.tier().supports_invalidation() {
                tracing::debug!(
                    "Tier does not support invalidation: tier={}",
                    descriptor.name()
                );
                report.skipped.push(descriptor.name().to_string());
                continue;
            }
            pending.push(async move { (descriptor.name(), descriptor.tier().invalidate(target).await) });
        }

        for (name, result) in join_all(pending).await {
            match result {
                Ok(removed) => report.removed += removed,
                Err(e) => {
                    tracing::warn!("Failed to invalidate tier: tier={}, error={}", name, e);
                    report.failures.push((name.to_string(), e));
                }
            }
        }

        report
    }

    /// Cache-aside read: return the cached value or load, cache and return it.
    ///
    /// `load` receives the logical key. A `None` from the loader is returned
    /// as-is and nothing is cached.
    ///
    /// # Example
    /// ```ignore
    /// let user = dispatcher
    ///     .get_or_insert_with("user:123", None, |key| async move { db.get_user(&key).await })
    ///     .await;
    /// ```
    pub async fn get_or_insert_with<V, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        load: F,
    ) -> Option<V>
    where
        V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Option<V>>,
    {
        if let Some(value) = self.get::<V>(key).await {
            return Some(value);
        }

        let value = load(key.to_string()).await?;
        self.set(key, value.clone(), ttl);
        Some(value)
    }

    /// Walk the tiers in order for an already versioned key.
    ///
    /// Misses, timeouts, errors and values of the wrong type all count as a miss
    /// for that tier. On a hit, the tiers that missed are backfilled in the
    /// background with their own write TTL.
    async fn retrieve_from_tiers<V>(&self, key: &str) -> Option<V>
    where
        V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let mut skipped: WritePlan = Vec::new();

        for (index, descriptor) in self.tiers.iter().enumerate() {
            let lookup =
                tokio::time::timeout(descriptor.retrieval_timeout(), descriptor.tier().get(key))
                    .await;

            match lookup {
                Ok(Ok(Some(found))) => match found.into_typed::<V>() {
                    Ok(value) => {
                        tracing::debug!(
                            "Cache hit: tier={}, key={}",
                            descriptor.name(),
                            key
                        );
                        if !skipped.is_empty() {
                            self.spawn_write(
                                skipped,
                                key.to_string(),
                                CachedValue::from_typed_with_serializer(value.clone()),
                            );
                        }
                        return Some(value);
                    }
                    Err(e) => {
                        tracing::error!(
                            "Unreadable cached value: tier={}, key={}, error={}",
                            descriptor.name(),
                            key,
                            e
                        );
                    }
                },
                Ok(Ok(None)) => {
                    tracing::debug!("Cache miss: tier={}, key={}", descriptor.name(), key);
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        "Cache request faulted: tier={}, key={}, error={}",
                        descriptor.name(),
                        key,
                        e
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        "Cache request timed out: tier={}, key={}, timeout={:?}",
                        descriptor.name(),
                        key,
                        descriptor.retrieval_timeout()
                    );
                }
            }

            skipped.push((index, descriptor.write_ttl()));
        }

        tracing::debug!("Failed to find cached value: key={}", key);
        None
    }

    /// Every tier with its own TTL, except the last one which takes
    /// `last_tier_ttl` when given.
    fn write_plan(&self, last_tier_ttl: Option<Duration>) -> WritePlan {
        let last = self.tiers.len().saturating_sub(1);
        self.tiers
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let ttl = match last_tier_ttl {
                    Some(ttl) if index == last => ttl,
                    _ => descriptor.write_ttl(),
                };
                (index, ttl)
            })
            .collect()
    }

    /// Fire-and-forget write of `value` to the planned tiers.
    fn spawn_write(&self, plan: WritePlan, key: String, value: CachedValue) {
        if plan.is_empty() {
            return;
        }

        let tiers = self.tiers.clone();
        tokio::spawn(async move {
            write_to_tiers(&tiers, &plan, &key, &value).await;
        });
    }
}

/// Write `value` to the planned tiers concurrently, converting it to each
/// tier's storage mode. Returns how many writes succeeded.
async fn write_to_tiers(
    tiers: &[TierDescriptor],
    plan: &[(usize, Duration)],
    key: &str,
    value: &CachedValue,
) -> usize {
    let writes = plan.iter().filter_map(|&(index, ttl)| {
        let descriptor = tiers.get(index)?;
        Some(async move {
            let result = match value.clone().convert_for_mode(descriptor.tier().storage_mode()) {
                Ok(converted) => descriptor.tier().set(key, converted, ttl).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    tracing::debug!(
                        "Stored value: tier={}, key={}, ttl={:?}",
                        descriptor.name(),
                        key,
                        ttl
                    );
                    true
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to store value: tier={}, key={}, error={}",
                        descriptor.name(),
                        key,
                        e
                    );
                    false
                }
            }
        })
    });

    join_all(writes).await.into_iter().filter(|ok| *ok).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invalidation::{InvalidationRules, describe};
    use crate::tier::CacheTier;
    use crate::tiers::instrumented::{InstrumentedTier, RecordingSink, TierMetric};
    use crate::tiers::memory::{MemoryTier, MemoryTierConfig};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    const WAIT: Duration = Duration::from_millis(100);

    /// Never answers a get; accepts writes.
    struct PendingTier;

    #[async_trait]
    impl CacheTier for PendingTier {
        fn name(&self) -> &'static str {
            "pending"
        }

        async fn get(&self, _key: &str) -> Result<Option<CachedValue>, CacheError> {
            std::future::pending().await
        }

        async fn set(&self, _: &str, _: CachedValue, _: Duration) -> Result<(), CacheError> {
            Ok(())
        }

        async fn remove(&self, _keys: &[&str]) -> Result<(), CacheError> {
            Ok(())
        }
    }

    /// Fails every call.
    struct FailingTier;

    #[async_trait]
    impl CacheTier for FailingTier {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError> {
            Err(CacheError::operation("failing", key, "connection refused"))
        }

        async fn set(&self, key: &str, _: CachedValue, _: Duration) -> Result<(), CacheError> {
            Err(CacheError::operation("failing", key, "connection refused"))
        }

        async fn remove(&self, _keys: &[&str]) -> Result<(), CacheError> {
            Err(CacheError::operation("failing", "", "connection refused"))
        }

        fn supports_invalidation(&self) -> bool {
            true
        }

        async fn invalidate(&self, _: &(dyn Any + Send + Sync)) -> Result<usize, CacheError> {
            Err(CacheError::operation("failing", "", "connection refused"))
        }
    }

    fn memory() -> Arc<MemoryTier> {
        Arc::new(MemoryTier::new(MemoryTierConfig::default()))
    }

    fn descriptor(name: &str, tier: Arc<dyn CacheTier>, ttl_secs: u64) -> TierDescriptor {
        TierDescriptor::new(
            name,
            tier,
            Duration::from_millis(50),
            Duration::from_secs(ttl_secs),
        )
    }

    fn dispatcher(current: u32, previous: u32, tiers: Vec<TierDescriptor>) -> CacheDispatcher {
        tiers
            .into_iter()
            .fold(
                CacheDispatcher::builder().generations(current, previous),
                |builder, tier| builder.tier(tier),
            )
            .build()
            .unwrap()
    }

    /// Memory tiers wrapped in recording sinks, with write TTLs in seconds.
    fn recorded(
        ttl_secs: &[u64],
    ) -> (Vec<Arc<MemoryTier>>, Vec<Arc<RecordingSink>>, Vec<TierDescriptor>) {
        let inner: Vec<Arc<MemoryTier>> = ttl_secs.iter().map(|_| memory()).collect();
        let sinks: Vec<Arc<RecordingSink>> =
            ttl_secs.iter().map(|_| Arc::new(RecordingSink::new())).collect();
        let tiers = ttl_secs
            .iter()
            .enumerate()
            .map(|(i, ttl)| {
                let tier: Arc<dyn CacheTier> =
                    Arc::new(InstrumentedTier::new(inner[i].clone(), sinks[i].clone()));
                descriptor(&format!("l{}", i + 1), tier, *ttl)
            })
            .collect();
        (inner, sinks, tiers)
    }

    async fn peek(tier: &dyn CacheTier, key: &str) -> Option<String> {
        tier.get(key)
            .await
            .unwrap()
            .map(|value| value.into_typed().unwrap())
    }

    #[tokio::test]
    async fn test_no_tiers_is_a_noop() {
        let cache = dispatcher(1, 1, vec![]);

        cache.set("key1", "value1".to_string(), None);
        assert_eq!(cache.set_and_wait("key1", "value1".to_string(), None).await, 0);
        assert_eq!(cache.get::<String>("key1").await, None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let l1 = memory();
        let cache = dispatcher(1, 1, vec![descriptor("l1", l1.clone(), 60)]);

        cache.set("key1", "value1".to_string(), None);
        tokio::time::sleep(WAIT).await;

        assert_eq!(cache.get::<String>("key1").await, Some("value1".to_string()));
        assert_eq!(
            peek(l1.as_ref(), "cache-version-1:key1").await,
            Some("value1".to_string())
        );
    }

    #[tokio::test]
    async fn test_fallback_backfills_skipped_tiers() {
        let l1 = memory();
        let l2 = memory();
        let cache = dispatcher(
            1,
            1,
            vec![descriptor("l1", l1.clone(), 60), descriptor("l2", l2.clone(), 300)],
        );

        l2.set(
            "cache-version-1:key1",
            CachedValue::from_typed("value1".to_string()),
            Duration::from_secs(300),
        )
        .await
        .unwrap();

        assert_eq!(cache.get::<String>("key1").await, Some("value1".to_string()));

        tokio::time::sleep(WAIT).await;
        assert_eq!(
            peek(l1.as_ref(), "cache-version-1:key1").await,
            Some("value1".to_string())
        );
    }

    #[tokio::test]
    async fn test_backfill_uses_each_tier_ttl() {
        let (inner, sinks, tiers) = recorded(&[10, 20, 30]);
        let cache = dispatcher(1, 1, tiers);

        inner[2]
            .set(
                "cache-version-1:key1",
                CachedValue::from_typed("value1".to_string()),
                Duration::from_secs(30),
            )
            .await
            .unwrap();

        assert_eq!(cache.get::<String>("key1").await, Some("value1".to_string()));
        tokio::time::sleep(WAIT).await;

        let key = "cache-version-1:key1".to_string();
        assert_eq!(sinks[0].writes(), vec![(key.clone(), Duration::from_secs(10))]);
        assert_eq!(sinks[1].writes(), vec![(key, Duration::from_secs(20))]);
        // The tier that answered is not rewritten
        assert!(sinks[2].writes().is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_tier_degrades_to_miss() {
        let l2 = memory();
        let cache = dispatcher(
            1,
            1,
            vec![
                descriptor("slow", Arc::new(PendingTier), 60),
                descriptor("l2", l2.clone(), 300),
            ],
        );
        cache.set_and_wait("key1", 42u64, None).await;

        let start = Instant::now();
        assert_eq!(cache.get::<u64>("key1").await, Some(42));
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(1), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_failing_tier_is_isolated() {
        let l2 = memory();
        let cache = dispatcher(
            1,
            1,
            vec![
                descriptor("broken", Arc::new(FailingTier), 60),
                descriptor("l2", l2.clone(), 300),
            ],
        );

        assert_eq!(cache.set_and_wait("key1", "value1".to_string(), None).await, 1);
        assert_eq!(cache.get::<String>("key1").await, Some("value1".to_string()));

        cache.remove("key1").await;
        assert_eq!(cache.get::<String>("key1").await, None);
    }

    #[tokio::test]
    async fn test_previous_generation_is_promoted() {
        let l1 = memory();
        let cache = dispatcher(2, 1, vec![descriptor("l1", l1.clone(), 60)]);

        l1.set(
            "cache-version-1:key1",
            CachedValue::from_typed("old".to_string()),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        assert_eq!(cache.get::<String>("key1").await, Some("old".to_string()));

        tokio::time::sleep(WAIT).await;
        assert_eq!(
            peek(l1.as_ref(), "cache-version-2:key1").await,
            Some("old".to_string())
        );
    }

    #[tokio::test]
    async fn test_promotion_writes_every_tier_with_own_ttl() {
        let (inner, sinks, tiers) = recorded(&[10, 20, 30]);
        let cache = dispatcher(2, 1, tiers);

        inner[0]
            .set(
                "cache-version-1:key1",
                CachedValue::from_typed("old".to_string()),
                Duration::from_secs(10),
            )
            .await
            .unwrap();

        assert_eq!(cache.get::<String>("key1").await, Some("old".to_string()));
        tokio::time::sleep(WAIT).await;

        let key = "cache-version-2:key1".to_string();
        for (sink, ttl) in sinks.iter().zip([10, 20, 30]) {
            assert_eq!(sink.writes(), vec![(key.clone(), Duration::from_secs(ttl))]);
        }
        assert_eq!(peek(inner[2].as_ref(), &key).await, Some("old".to_string()));
    }

    #[tokio::test]
    async fn test_last_tier_takes_caller_ttl() {
        let (_, sinks, tiers) = recorded(&[10, 20, 30]);
        let cache = dispatcher(1, 1, tiers);

        cache.set("key1", "value1".to_string(), Some(Duration::from_secs(30)));
        tokio::time::sleep(WAIT).await;

        let key = "cache-version-1:key1".to_string();
        assert_eq!(sinks[0].writes(), vec![(key.clone(), Duration::from_secs(10))]);
        assert_eq!(sinks[1].writes(), vec![(key.clone(), Duration::from_secs(20))]);
        assert_eq!(sinks[2].writes(), vec![(key, Duration::from_secs(30))]);
    }

    #[tokio::test]
    async fn test_last_tier_defaults_to_own_ttl() {
        let sink = Arc::new(RecordingSink::new());
        let tier: Arc<dyn CacheTier> = Arc::new(InstrumentedTier::new(memory(), sink.clone()));
        let cache = dispatcher(1, 1, vec![descriptor("l1", tier, 45)]);

        cache.set_and_wait("key1", 1u8, None).await;
        assert_eq!(
            sink.writes(),
            vec![("cache-version-1:key1".to_string(), Duration::from_secs(45))]
        );
    }

    #[tokio::test]
    async fn test_same_generation_reads_once() {
        let sink = Arc::new(RecordingSink::new());
        let tier: Arc<dyn CacheTier> = Arc::new(InstrumentedTier::new(memory(), sink.clone()));
        let cache = dispatcher(3, 3, vec![descriptor("l1", tier, 60)]);

        assert_eq!(cache.get::<String>("missing").await, None);

        let reads = sink
            .take_metrics()
            .into_iter()
            .filter(|metric| matches!(metric, TierMetric::Read { .. }))
            .count();
        assert_eq!(reads, 1);
    }

    #[tokio::test]
    async fn test_versioned_key_is_not_reversioned() {
        let l1 = memory();
        let cache = dispatcher(2, 1, vec![descriptor("l1", l1.clone(), 60)]);

        l1.set(
            "cache-version-1:key1",
            CachedValue::from_typed("pinned".to_string()),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        assert_eq!(
            cache.get::<String>("cache-version-1:key1").await,
            Some("pinned".to_string())
        );
    }

    #[tokio::test]
    async fn test_wrong_type_is_a_miss() {
        let l1 = memory();
        let cache = dispatcher(1, 1, vec![descriptor("l1", l1, 60)]);

        cache.set_and_wait("key1", "text".to_string(), None).await;
        assert_eq!(cache.get::<u64>("key1").await, None);
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        let l1 = memory();
        let cache = dispatcher(1, 1, vec![descriptor("l1", l1.clone(), 60)]);

        assert_eq!(cache.set_and_wait("", 1u8, None).await, 0);
        assert_eq!(cache.get::<u8>("").await, None);
        assert!(l1.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_clears_both_generations() {
        let l1 = memory();
        let cache = dispatcher(2, 1, vec![descriptor("l1", l1.clone(), 60)]);

        for key in ["cache-version-1:key1", "cache-version-2:key1"] {
            l1.set(key, CachedValue::from_typed(1u8), Duration::from_secs(60))
                .await
                .unwrap();
        }

        cache.remove("key1").await;
        assert!(l1.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_reports_per_tier() {
        struct User {
            id: u64,
        }

        let l1 = Arc::new(MemoryTier::new(MemoryTierConfig::default()).with_invalidation(
            InvalidationRules::default().with(describe(|u: &User| vec![format!("user:{}", u.id)])),
        ));
        let l2 = memory();
        let cache = dispatcher(
            2,
            1,
            vec![
                descriptor("l1", l1.clone(), 60),
                descriptor("l2", l2, 60),
                descriptor("broken", Arc::new(FailingTier), 60),
            ],
        );

        cache.set_and_wait("user:1", "Alice".to_string(), None).await;
        l1.set(
            "cache-version-1:user:1",
            CachedValue::from_typed("Old Alice".to_string()),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let report = cache.invalidate(&User { id: 1 }).await;
        assert_eq!(report.removed, 2);
        assert_eq!(report.skipped, vec!["l2".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "broken");
        assert!(!report.is_clean());
        assert!(l1.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_or_insert_with_loads_once() {
        let l1 = memory();
        let cache = dispatcher(1, 1, vec![descriptor("l1", l1, 60)]);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let value = cache
                .get_or_insert_with("user:1", None, |key| async move {
                    assert_eq!(key, "user:1");
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some("Alice".to_string())
                })
                .await;
            assert_eq!(value, Some("Alice".to_string()));
            tokio::time::sleep(WAIT).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_insert_with_loader_miss() {
        let cache = dispatcher(1, 1, vec![descriptor("l1", memory(), 60)]);

        let value: Option<String> = cache
            .get_or_insert_with("user:404", None, |_| async { None })
            .await;
        assert_eq!(value, None);
    }
}
