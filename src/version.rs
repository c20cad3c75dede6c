/// Source of the cache generations.
///
/// Bumping the current generation invalidates every entry at once: new reads
/// and writes go to freshly versioned keys, while the previous generation stays
/// readable as a fallback until the next bump.
pub trait VersionProvider: Send + Sync {
    /// The generation all writes go to.
    fn current_generation(&self) -> u32;

    /// The generation consulted when the current one misses.
    fn previous_generation(&self) -> u32;
}

/// Fixed pair of generations, typically taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticVersions {
    pub current: u32,
    pub previous: u32,
}

impl StaticVersions {
    pub fn new(current: u32, previous: u32) -> Self {
        StaticVersions { current, previous }
    }
}

impl VersionProvider for StaticVersions {
    fn current_generation(&self) -> u32 {
        self.current
    }

    fn previous_generation(&self) -> u32 {
        self.previous
    }
}
