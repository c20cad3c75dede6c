//! Metrics decorator for cache tiers.
//!
//! [`InstrumentedTier`] wraps any tier and reports every read, write and remove
//! to a user-provided [`MetricsSink`].
//!
//! # Example
//!
//! ```ignore
//! let sink = Arc::new(MyMetricsSink::new());
//! let moka = Arc::new(MokaTier::new(MokaTierConfig::default()));
//! let tier: Arc<dyn CacheTier> = Arc::new(InstrumentedTier::new(moka, sink.clone()));
//!
//! let l1 = TierDescriptor::new("l1", tier, Duration::from_millis(5), Duration::from_secs(60));
//! ```

use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::tier::CacheTier;
use crate::value::{CachedValue, StorageMode};

/// Metrics emitted by the InstrumentedTier wrapper.
#[derive(Debug, Clone)]
pub enum TierMetric {
    /// Emitted on every get.
    Read {
        key: String,
        hit: bool,
        /// Whether the tier returned an error.
        failed: bool,
        latency_ms: f64,
        /// Name of the wrapped tier (from CacheTier::name()).
        tier: String,
    },
    /// Emitted on every set.
    Write {
        key: String,
        /// TTL the value was written with.
        ttl: Duration,
        failed: bool,
        latency_ms: f64,
        tier: String,
    },
    /// Emitted on every remove.
    Remove {
        /// Number of keys in the remove batch.
        key_count: usize,
        /// First key in the batch (for debugging/identification).
        first_key: Option<String>,
        latency_ms: f64,
        tier: String,
    },
}

/// Receiver for tier metrics.
///
/// `emit` is called synchronously on the tier's hot path, so implementations
/// should only buffer.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Emit a single metric.
    fn emit(&self, metric: TierMetric);

    /// Flush any buffered metrics.
    async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A tier wrapper that emits metrics for all operations.
pub struct InstrumentedTier {
    inner: Arc<dyn CacheTier>,
    sink: Arc<dyn MetricsSink>,
    tier_name: String,
}

impl InstrumentedTier {
    /// Wrap `inner`, reporting to `sink`.
    pub fn new(inner: Arc<dyn CacheTier>, sink: Arc<dyn MetricsSink>) -> Self {
        let tier_name = inner.name().to_string();
        InstrumentedTier {
            inner,
            sink,
            tier_name,
        }
    }

    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }

    fn elapsed_ms(start: Instant) -> f64 {
        start.elapsed().as_secs_f64() * 1000.0
    }
}

#[async_trait]
impl CacheTier for InstrumentedTier {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn storage_mode(&self) -> StorageMode {
        self.inner.storage_mode()
    }

    async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError> {
        let start = Instant::now();
        let result = self.inner.get(key).await;
        let latency_ms = Self::elapsed_ms(start);

        self.sink.emit(TierMetric::Read {
            key: key.to_string(),
            hit: matches!(result, Ok(Some(_))),
            failed: result.is_err(),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn set(&self, key: &str, value: CachedValue, ttl: Duration) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.set(key, value, ttl).await;
        let latency_ms = Self::elapsed_ms(start);

        self.sink.emit(TierMetric::Write {
            key: key.to_string(),
            ttl,
            failed: result.is_err(),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.remove(keys).await;
        let latency_ms = Self::elapsed_ms(start);

        self.sink.emit(TierMetric::Remove {
            key_count: keys.len(),
            first_key: keys.first().map(|k| k.to_string()),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.inner.keys_matching(pattern).await
    }

    fn supports_invalidation(&self) -> bool {
        self.inner.supports_invalidation()
    }

    async fn invalidate(&self, target: &(dyn Any + Send + Sync)) -> Result<usize, CacheError> {
        self.inner.invalidate(target).await
    }
}

/// Sink that keeps every metric in memory, for tests and diagnostics.
#[derive(Default)]
pub struct RecordingSink {
    metrics: std::sync::Mutex<Vec<TierMetric>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded metrics.
    pub fn take_metrics(&self) -> Vec<TierMetric> {
        match self.metrics.lock() {
            Ok(mut metrics) => std::mem::take(&mut *metrics),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Write metrics recorded so far, without draining.
    pub fn writes(&self) -> Vec<(String, Duration)> {
        let metrics = match self.metrics.lock() {
            Ok(metrics) => metrics,
            Err(poisoned) => poisoned.into_inner(),
        };
        metrics
            .iter()
            .filter_map(|metric| match metric {
                TierMetric::Write { key, ttl, .. } => Some((key.clone(), *ttl)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    fn emit(&self, metric: TierMetric) {
        match self.metrics.lock() {
            Ok(mut metrics) => metrics.push(metric),
            Err(poisoned) => poisoned.into_inner().push(metric),
        }
    }

    async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}
