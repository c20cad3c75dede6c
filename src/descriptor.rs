use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::tier::CacheTier;

/// A tier together with the settings the dispatcher applies to it.
#[derive(Clone)]
pub struct TierDescriptor {
    name: String,
    tier: Arc<dyn CacheTier>,
    retrieval_timeout: Duration,
    write_ttl: Duration,
}

impl TierDescriptor {
    /// Describe a tier.
    ///
    /// # Arguments
    /// * `name` - Name used in logs and configuration, unique per dispatcher
    /// * `tier` - The tier instance, possibly shared with other dispatchers
    /// * `retrieval_timeout` - Upper bound for a single get against this tier
    /// * `write_ttl` - Life span of values this dispatcher writes to the tier
    ///
    /// # Example
    /// ```ignore
    /// let l1 = TierDescriptor::new(
    ///     "l1",
    ///     Arc::new(MemoryTier::new(MemoryTierConfig::default())),
    ///     Duration::from_millis(5),
    ///     Duration::from_secs(60),
    /// );
    /// ```
    pub fn new(
        name: impl Into<String>,
        tier: Arc<dyn CacheTier>,
        retrieval_timeout: Duration,
        write_ttl: Duration,
    ) -> Self {
        TierDescriptor {
            name: name.into(),
            tier,
            retrieval_timeout,
            write_ttl,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tier(&self) -> &Arc<dyn CacheTier> {
        &self.tier
    }

    pub fn retrieval_timeout(&self) -> Duration {
        self.retrieval_timeout
    }

    pub fn write_ttl(&self) -> Duration {
        self.write_ttl
    }
}

impl fmt::Debug for TierDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierDescriptor")
            .field("name", &self.name)
            .field("tier", &self.tier.name())
            .field("retrieval_timeout", &self.retrieval_timeout)
            .field("write_ttl", &self.write_ttl)
            .finish()
    }
}
