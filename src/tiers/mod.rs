//! Tier implementations for the cache library.

pub mod instrumented;
pub mod memory;
pub mod moka;
pub mod redis;

pub use instrumented::{InstrumentedTier, MetricsSink, RecordingSink, TierMetric};
pub use memory::{EntryLookup, EvictOnSetConfig, MemoryTier, MemoryTierConfig};
pub use self::moka::{MokaTier, MokaTierConfig};
pub use self::redis::{RedisTier, RedisTierConfig};
