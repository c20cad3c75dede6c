//! multilevel-cache - A versioned multi-tier cache library for Rust
//!
//! This library puts several cache tiers behind a single dispatcher:
//! - Ordered tier lookup with a per-tier retrieval timeout
//! - Background backfill of the faster tiers that missed
//! - Generation-versioned keys with fallback to the previous generation
//! - Pattern invalidation driven by domain objects
//! - Stale-while-refresh reads for in-memory entries
//!
//! A slow or failing tier never fails a request; it is treated as a miss.
//!
//! # Example
//!
//! ```ignore
//! use multilevel_cache::{
//!     CacheDispatcher, MemoryTier, MemoryTierConfig, RedisTier, RedisTierConfig, TierDescriptor,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), multilevel_cache::CacheError> {
//!     let memory = Arc::new(MemoryTier::new(MemoryTierConfig::default()));
//!     let redis = Arc::new(RedisTier::new(RedisTierConfig::new("redis://localhost:6379")).await?);
//!
//!     let cache = CacheDispatcher::builder()
//!         .generations(2, 1)
//!         .tier(TierDescriptor::new("l1", memory, Duration::from_millis(5), Duration::from_secs(60)))
//!         .tier(TierDescriptor::new("l2", redis, Duration::from_millis(50), Duration::from_secs(3600)))
//!         .build()?;
//!
//!     cache.set("user:123", "Alice".to_string(), None);
//!
//!     let user = cache
//!         .get_or_insert_with("user:123", None, |key| async move {
//!             // Load from database - 'key' is "user:123"
//!             Some(format!("User data for {}", key))
//!         })
//!         .await;
//!     Ok(())
//! }
//! ```

mod builder;
mod config;
mod descriptor;
mod dispatcher;
mod entry;
mod error;
pub mod invalidation;
mod refresh;
pub mod serializer;
mod tier;
pub mod tiers;
mod utils;
mod value;
mod version;
pub mod versioning;

// Re-export public API
pub use builder::DispatcherBuilder;
pub use config::{DispatcherConfig, TierConfig, TierRegistry};
pub use descriptor::TierDescriptor;
pub use dispatcher::{CacheDispatcher, InvalidationReport};
pub use entry::{Entry, EntryState};
pub use error::CacheError;
pub use invalidation::{InvalidationDescriptor, InvalidationRules, describe};
pub use refresh::StaleWhileRefresh;
pub use serializer::{CacheSerializer, HexSerializer, JsonSerializer};
pub use tier::CacheTier;
pub use tiers::instrumented::{InstrumentedTier, MetricsSink, RecordingSink, TierMetric};
pub use tiers::memory::{EntryLookup, EvictOnSetConfig, MemoryTier, MemoryTierConfig};
pub use tiers::moka::{MokaTier, MokaTierConfig};
pub use tiers::redis::{RedisTier, RedisTierConfig};
pub use value::{CachedValue, StorageMode};
pub use version::{StaticVersions, VersionProvider};
pub use versioning::version_key;
