//! Declarative dispatcher configuration.
//!
//! A [`DispatcherConfig`] names tiers by type; the instances come from a
//! [`TierRegistry`] filled by the application at startup.
//!
//! ```json
//! {
//!   "current_generation": 2,
//!   "previous_generation": 1,
//!   "tiers": [
//!     { "name": "l1", "type": "memory", "timeout_ms": 5, "expiration_ms": 60000 },
//!     { "name": "l2", "type": "redis", "timeout_ms": 50, "expiration_ms": 3600000 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::builder::tier_name_problems;
use crate::descriptor::TierDescriptor;
use crate::dispatcher::CacheDispatcher;
use crate::error::CacheError;
use crate::tier::CacheTier;
use crate::version::StaticVersions;

/// One tier entry, in lookup order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Unique name, used in logs.
    pub name: String,
    /// Key into the [`TierRegistry`].
    #[serde(rename = "type")]
    pub tier_type: String,
    /// Retrieval timeout in milliseconds.
    pub timeout_ms: u64,
    /// Write TTL in milliseconds.
    pub expiration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub current_generation: u32,
    pub previous_generation: u32,
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
}

impl DispatcherConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        serde_json::from_str(json)
            .map_err(|e| CacheError::Config(format!("Invalid dispatcher configuration: {}", e)))
    }
}

/// Tier instances by type name.
#[derive(Default, Clone)]
pub struct TierRegistry {
    tiers: HashMap<String, Arc<dyn CacheTier>>,
}

impl TierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tier` under `tier_type`, replacing any previous registration.
    pub fn register(mut self, tier_type: impl Into<String>, tier: Arc<dyn CacheTier>) -> Self {
        self.tiers.insert(tier_type.into(), tier);
        self
    }

    pub fn get(&self, tier_type: &str) -> Option<&Arc<dyn CacheTier>> {
        self.tiers.get(tier_type)
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.tiers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl CacheDispatcher {
    /// Build a dispatcher from configuration, resolving tier types in `registry`.
    ///
    /// Every problem in the configuration is collected and reported in a single
    /// [`CacheError::Config`]; nothing is built unless the whole configuration
    /// is valid.
    pub fn from_config(
        config: &DispatcherConfig,
        registry: &TierRegistry,
    ) -> Result<CacheDispatcher, CacheError> {
        let mut problems = Vec::new();

        if config.previous_generation > config.current_generation {
            problems.push(format!(
                "previous generation {} is newer than current generation {}",
                config.previous_generation, config.current_generation
            ));
        }

        let mut descriptors = Vec::with_capacity(config.tiers.len());
        for entry in &config.tiers {
            if entry.expiration_ms == 0 {
                problems.push(format!("tier '{}' has a zero expiration", entry.name));
            }

            match registry.get(&entry.tier_type) {
                Some(tier) => descriptors.push(TierDescriptor::new(
                    entry.name.clone(),
                    tier.clone(),
                    Duration::from_millis(entry.timeout_ms),
                    Duration::from_millis(entry.expiration_ms),
                )),
                None => problems.push(format!(
                    "tier '{}' has unknown type '{}' (registered: {:?})",
                    entry.name,
                    entry.tier_type,
                    registry.types()
                )),
            }
        }

        problems.extend(tier_name_problems(&descriptors));

        if !problems.is_empty() {
            tracing::error!("Invalid dispatcher configuration: {}", problems.join("; "));
            return Err(CacheError::Config(problems.join("; ")));
        }

        tracing::debug!(
            "Configured dispatcher: current={}, previous={}, tiers={:?}",
            config.current_generation,
            config.previous_generation,
            descriptors.iter().map(|d| d.name()).collect::<Vec<_>>()
        );

        Ok(CacheDispatcher::new(
            descriptors,
            Arc::new(StaticVersions::new(
                config.current_generation,
                config.previous_generation,
            )),
        ))
    }
}
