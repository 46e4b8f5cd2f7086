/// Tunable parameters for the caching strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
    /// Number of cache slots reserved up front. Stat sets in combat-heavy
    /// hosts run from dozens to a few hundred modifiers; reserving avoids
    /// rehashing during the first burst of queries.
    pub initial_capacity: usize,
}

impl CacheConfig {
    pub const DEFAULT_INITIAL_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self {
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
        }
    }

    pub fn with_initial_capacity(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}
