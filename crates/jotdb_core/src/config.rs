//! Cache configuration.

use std::collections::HashSet;

/// Eviction order for a [`crate::MemoryLimitedCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Least-recently-used: reads and writes both refresh an entry.
    #[default]
    Lru,
    /// First-in-first-out: only writes refresh an entry.
    Fifo,
}

impl EvictionPolicy {
    /// Parses a policy name, case-insensitively.
    ///
    /// Anything that is not `"fifo"` means LRU.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("fifo") {
            Self::Fifo
        } else {
            Self::Lru
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Fifo => "fifo",
        }
    }
}

/// Configuration for a [`crate::MemoryLimitedCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Byte budget in mebibytes. `0` disables eviction entirely.
    pub max_memory_mb: f64,

    /// Eviction order.
    pub policy: EvictionPolicy,

    /// Keys that are never chosen as eviction victims.
    pub pinned: HashSet<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 1024.0,
            policy: EvictionPolicy::Lru,
            pinned: HashSet::new(),
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the byte budget in mebibytes. Negative values clamp to zero.
    #[must_use]
    pub fn max_memory_mb(mut self, mb: f64) -> Self {
        self.max_memory_mb = mb.max(0.0);
        self
    }

    /// Sets the eviction policy.
    #[must_use]
    pub fn policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds a key to the pinned set.
    #[must_use]
    pub fn pin(mut self, key: impl Into<String>) -> Self {
        self.pinned.insert(key.into());
        self
    }

    /// Replaces the pinned set.
    #[must_use]
    pub fn pinned(mut self, pinned: HashSet<String>) -> Self {
        self.pinned = pinned;
        self
    }

    /// Returns the budget in bytes. `0` means eviction is disabled.
    #[must_use]
    pub fn budget_bytes(&self) -> usize {
        (self.max_memory_mb * 1024.0 * 1024.0) as usize
    }
}
