//! Byte-bounded cache over a backend.

use crate::config::{CacheConfig, EvictionPolicy};
use crate::error::CoreResult;
use crate::order::OrderList;
use jotdb_storage::{sizing, KvBackend};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Callback invoked after an entry has been evicted.
///
/// Receives the evicted key and the value it held just before removal. A
/// failing hook is logged and ignored; it never corrupts the cache.
pub type EvictHook = Box<dyn FnMut(&str, &Value) -> CoreResult<()>>;

/// A cache that wraps a backend, tracks per-entry byte cost, and keeps the
/// total under a budget by evicting entries in LRU or FIFO order.
///
/// All reads and writes pass through to the wrapped backend; the cache adds
/// a private accounting side-table (sizes and an ordering list) and never
/// exposes it. Pinned keys are exempt from eviction, which means the cache
/// may exceed its budget when only pinned keys remain.
///
/// # Example
///
/// ```
/// use jotdb_core::{CacheConfig, EvictionPolicy, MemoryLimitedCache};
/// use jotdb_storage::MemoryBackend;
/// use serde_json::json;
///
/// let config = CacheConfig::new()
///     .max_memory_mb(0.001)
///     .policy(EvictionPolicy::Fifo);
/// let mut cache = MemoryLimitedCache::new(MemoryBackend::new(), config);
///
/// for i in 0..100 {
///     cache.set(&format!("k{i}"), json!("x".repeat(64))).unwrap();
/// }
/// // oldest entries were evicted to honor the budget
/// assert!(cache.get("k0").unwrap().is_none());
/// assert!(cache.get("k99").unwrap().is_some());
/// ```
pub struct MemoryLimitedCache<B: KvBackend> {
    inner: B,
    budget: usize,
    policy: EvictionPolicy,
    pinned: HashSet<String>,
    sizes: HashMap<String, usize>,
    order: OrderList,
    current_bytes: usize,
    on_evict: Option<EvictHook>,
}

impl<B: KvBackend> MemoryLimitedCache<B> {
    /// Wraps a backend with the given configuration.
    #[must_use]
    pub fn new(inner: B, config: CacheConfig) -> Self {
        Self {
            inner,
            budget: config.budget_bytes(),
            policy: config.policy,
            pinned: config.pinned,
            sizes: HashMap::new(),
            order: OrderList::new(),
            current_bytes: 0,
            on_evict: None,
        }
    }

    /// Installs the eviction hook, replacing any previous one.
    pub fn set_evict_hook(&mut self, hook: EvictHook) {
        self.on_evict = Some(hook);
    }

    /// Returns the eviction policy.
    #[must_use]
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Returns the byte budget. `0` means eviction is disabled.
    #[must_use]
    pub fn budget_bytes(&self) -> usize {
        self.budget
    }

    /// Returns the cache's own byte counter (not the backend's estimate).
    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.current_bytes
    }

    /// Returns a shared reference to the wrapped backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner
    }

    /// Returns true if the key is present.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn exists(&self, key: &str) -> CoreResult<bool> {
        Ok(self.inner.exists(key)?)
    }

    /// Reads through to the backend. Under LRU, a hit refreshes the entry's
    /// position in the eviction order.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn get(&mut self, key: &str) -> CoreResult<Option<Value>> {
        let value = self.inner.get(key)?;
        if value.is_some() && self.policy == EvictionPolicy::Lru {
            self.order.move_to_back(key);
        }
        Ok(value)
    }

    /// Writes through to the backend, records the entry's cost, and evicts
    /// until the budget holds again.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn set(&mut self, key: &str, value: Value) -> CoreResult<()> {
        if self.inner.exists(key)? {
            self.drop_accounting(key);
        }

        let size = sizing::entry_size(key, &value);
        self.inner.set(key, value)?;

        self.sizes.insert(key.to_string(), size);
        self.current_bytes += size;
        self.order.push_back(key);

        self.maybe_evict()
    }

    /// Removes a key and its accounting. Returns false if it was absent.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn erase(&mut self, key: &str) -> CoreResult<bool> {
        if self.inner.exists(key)? {
            self.drop_accounting(key);
        }
        Ok(self.inner.erase(key)?)
    }

    /// Removes every key and clears all accounting.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn clean(&mut self) -> CoreResult<()> {
        self.inner.clean()?;
        self.sizes.clear();
        self.order.clear();
        self.current_bytes = 0;
        Ok(())
    }

    /// Returns every key matching a glob pattern.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn keys(&self, pattern: &str) -> CoreResult<Vec<String>> {
        Ok(self.inner.keys(pattern)?)
    }

    fn drop_accounting(&mut self, key: &str) {
        if let Some(size) = self.sizes.remove(key) {
            self.current_bytes = self.current_bytes.saturating_sub(size);
        }
        self.order.remove(key);
    }

    /// Evicts from the front of the ordering list until the budget holds,
    /// skipping pinned keys. Stops when only pinned keys remain.
    fn maybe_evict(&mut self) -> CoreResult<()> {
        if self.budget == 0 {
            return Ok(());
        }
        while self.current_bytes > self.budget && !self.order.is_empty() {
            let victim = self
                .order
                .iter()
                .find(|k| !self.pinned.contains(*k))
                .map(str::to_string);
            let Some(victim) = victim else {
                break;
            };

            let value = self.inner.get(&victim)?;
            self.drop_accounting(&victim);
            self.inner.erase(&victim)?;
            debug!(
                key = %victim,
                used = %sizing::humanize_bytes(self.current_bytes),
                "evicted cache entry"
            );

            if let (Some(hook), Some(value)) = (self.on_evict.as_mut(), value) {
                if let Err(error) = hook(&victim, &value) {
                    warn!(key = %victim, %error, "evict hook failed");
                }
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn assert_accounting_consistent(&self) {
        assert_eq!(self.sizes.len(), self.order.len());
        assert_eq!(
            self.sizes.values().sum::<usize>(),
            self.current_bytes,
            "recorded sizes must sum to the byte counter"
        );
        for key in self.order.iter() {
            assert!(self.sizes.contains_key(key));
        }
    }
}
