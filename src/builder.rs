//! Builder API for creating cache dispatchers.
//!
//! Tiers are added in lookup order: the first tier is consulted first and
//! should be the fastest one.

use std::collections::HashSet;
use std::sync::Arc;

use crate::descriptor::TierDescriptor;
use crate::dispatcher::CacheDispatcher;
use crate::error::CacheError;
use crate::version::{StaticVersions, VersionProvider};

/// Builder for [`CacheDispatcher`].
///
/// # Example
///
/// ```ignore
/// use multilevel_cache::{CacheDispatcher, MemoryTier, MemoryTierConfig, TierDescriptor};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let memory = Arc::new(MemoryTier::new(MemoryTierConfig::default()));
///
/// let cache = CacheDispatcher::builder()
///     .generations(2, 1)
///     .tier(TierDescriptor::new(
///         "memory",
///         memory,
///         Duration::from_millis(5),
///         Duration::from_secs(60),
///     ))
///     .build()?;
/// ```
#[derive(Default)]
pub struct DispatcherBuilder {
    versions: Option<Arc<dyn VersionProvider>>,
    tiers: Vec<TierDescriptor>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `provider` for the current and previous generations.
    pub fn versions(mut self, provider: Arc<dyn VersionProvider>) -> Self {
        self.versions = Some(provider);
        self
    }

    /// Shorthand for [`versions`](Self::versions) with fixed generations.
    pub fn generations(self, current: u32, previous: u32) -> Self {
        self.versions(Arc::new(StaticVersions::new(current, previous)))
    }

    /// Append a tier; tiers are consulted in the order they are added.
    pub fn tier(mut self, descriptor: TierDescriptor) -> Self {
        self.tiers.push(descriptor);
        self
    }

    /// Append several tiers at once.
    pub fn tiers(mut self, descriptors: impl IntoIterator<Item = TierDescriptor>) -> Self {
        self.tiers.extend(descriptors);
        self
    }

    /// Build the dispatcher.
    ///
    /// Fails with [`CacheError::Config`] listing every problem found: no
    /// version provider, a previous generation newer than the current one, or
    /// an empty or duplicate tier name. A dispatcher without tiers is valid and
    /// caches nothing.
    pub fn build(self) -> Result<CacheDispatcher, CacheError> {
        let mut problems = Vec::new();

        match &self.versions {
            Some(versions) => {
                let (current, previous) =
                    (versions.current_generation(), versions.previous_generation());
                if previous > current {
                    problems.push(format!(
                        "previous generation {} is newer than current generation {}",
                        previous, current
                    ));
                }
            }
            None => problems.push("no version provider configured".to_string()),
        }

        problems.extend(tier_name_problems(&self.tiers));

        let Some(versions) = self.versions else {
            return Err(CacheError::Config(problems.join("; ")));
        };
        if !problems.is_empty() {
            return Err(CacheError::Config(problems.join("; ")));
        }

        Ok(CacheDispatcher::new(self.tiers, versions))
    }
}

pub(crate) fn tier_name_problems(tiers: &[TierDescriptor]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();

    for (index, descriptor) in tiers.iter().enumerate() {
        if descriptor.name().trim().is_empty() {
            problems.push(format!("tier #{} has an empty name", index));
        } else if !seen.insert(descriptor.name()) {
            problems.push(format!("duplicate tier name '{}'", descriptor.name()));
        }
    }

    problems
}
