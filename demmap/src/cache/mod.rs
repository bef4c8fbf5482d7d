//! Size-bounded cache with pluggable eviction.
//!
//! [`BoundedCache`] stores values together with their byte size and keeps the
//! sum of resident sizes under a budget. Which key to give up is delegated to
//! an [`EvictionPolicy`] trait object ([`LruPolicy`] or [`LfuPolicy`]).
//!
//! The cache is a best-effort accelerator: a miss and an insert that cannot
//! free enough space are both silent, valid outcomes. An entry larger than
//! the whole budget is still stored, and is then the only resident entry.
//!
//! ```
//! use demmap::cache::{BoundedCache, PolicyKind};
//!
//! let cache = BoundedCache::with_policy(100, PolicyKind::Lru);
//! cache.insert("a", 1, 60);
//! let outcome = cache.insert("b", 2, 60);
//!
//! // "a" was evicted to make room for "b"
//! assert_eq!(outcome.evicted, vec![1]);
//! assert_eq!(cache.get(&"b"), Some(2));
//! assert_eq!(cache.get(&"a"), None);
//! ```

mod lfu;
mod lru;
mod policy;

pub use lfu::LfuPolicy;
pub use lru::LruPolicy;
pub use policy::{EvictionPolicy, PolicyKind};

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Byte size helpers for cache budgets. Results saturate at `u64::MAX`.
pub const fn kib(n: u64) -> u64 {
    n.saturating_mul(1024)
}

/// Mebibytes to bytes.
pub const fn mib(n: u64) -> u64 {
    n.saturating_mul(1024 * 1024)
}

/// Gibibytes to bytes.
pub const fn gib(n: u64) -> u64 {
    n.saturating_mul(1024 * 1024 * 1024)
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of entries currently in the cache.
    pub entry_count: u64,
    /// Number of cache hits (requests served from cache).
    pub hit_count: u64,
    /// Number of cache misses.
    pub miss_count: u64,
    /// Number of entries evicted to make room (including expired ones).
    pub eviction_count: u64,
    /// Sum of the sizes of resident entries, in bytes.
    pub resident_bytes: u64,
    /// Configured budget, in bytes.
    pub budget_bytes: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Result of an insert.
#[derive(Debug)]
pub struct InsertOutcome<V> {
    /// `false` when the key was already present (the old value is kept).
    pub inserted: bool,
    /// Values evicted to make room, so the caller can release them.
    pub evicted: Vec<V>,
}

struct Entry<V> {
    value: V,
    size: u64,
    /// Unix time in seconds after which the entry is stale; 0 never expires.
    valid_until: u64,
}

struct CacheState<K, V> {
    budget: u64,
    current: u64,
    values: HashMap<K, Entry<V>>,
    policy: Box<dyn EvictionPolicy<K>>,
    /// Entries with a non-zero `valid_until`.
    expiring: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// A thread-safe key-value cache bounded by total byte size.
///
/// Every public operation takes one lock around the whole state.
pub struct BoundedCache<K, V> {
    state: Mutex<CacheState<K, V>>,
    clock: fn() -> u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone,
{
    /// Create a cache with a byte budget and an eviction policy.
    pub fn new(budget_bytes: u64, policy: Box<dyn EvictionPolicy<K>>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                budget: budget_bytes,
                current: 0,
                values: HashMap::new(),
                policy,
                expiring: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            clock: unix_now,
        }
    }

    /// Create a cache using one of the built-in policies.
    pub fn with_policy(budget_bytes: u64, kind: PolicyKind) -> Self {
        Self::new(budget_bytes, kind.build())
    }

    /// Insert a value that never expires.
    ///
    /// If `key` is already present nothing changes: the existing value is
    /// kept and `inserted` is `false`.
    pub fn insert(&self, key: K, value: V, size: u64) -> InsertOutcome<V> {
        self.insert_inner(key, value, size, 0, None)
    }

    /// Insert a value that becomes evictable `ttl_seconds` after insertion.
    ///
    /// Expiry is only evaluated when a later insert needs headroom. A TTL of
    /// zero means the entry never expires.
    pub fn insert_with_ttl(&self, key: K, value: V, size: u64, ttl_seconds: u64) -> InsertOutcome<V> {
        self.insert_inner(key, value, size, ttl_seconds, None)
    }

    /// Insert a value with a restored usage count, when reloading a [`snapshot`](Self::snapshot).
    pub fn insert_with_usage(&self, key: K, value: V, size: u64, usage: u64) -> InsertOutcome<V> {
        self.insert_inner(key, value, size, 0, Some(usage))
    }

    fn insert_inner(
        &self,
        key: K,
        value: V,
        size: u64,
        ttl_seconds: u64,
        usage: Option<u64>,
    ) -> InsertOutcome<V> {
        let now = (self.clock)();
        let mut state = self.state.lock();

        if state.values.contains_key(&key) {
            return InsertOutcome {
                inserted: false,
                evicted: Vec::new(),
            };
        }

        let mut evicted = Vec::new();

        if !state.values.is_empty() && state.current + size > state.budget {
            if state.expiring > 0 {
                state.evict_expired(now, &mut evicted);
            }

            while state.current + size > state.budget {
                let Some(least) = state.policy.evict() else {
                    break;
                };
                if let Some(entry) = state.take(&least) {
                    evicted.push(entry.value);
                }
            }
            state.evictions += evicted.len() as u64;
        }

        let valid_until = if ttl_seconds == 0 {
            0
        } else {
            state.expiring += 1;
            now + ttl_seconds
        };

        state.current += size;
        state.values.insert(
            key.clone(),
            Entry {
                value,
                size,
                valid_until,
            },
        );
        match usage {
            Some(u) => state.policy.insert_with_usage(key, u),
            None => state.policy.insert(key),
        }

        InsertOutcome {
            inserted: true,
            evicted,
        }
    }

    /// Look up a value and record the access with the eviction policy.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();

        let value = state.values.get(key).map(|e| e.value.clone());
        match value {
            Some(v) => {
                state.hits += 1;
                state.policy.update(key);
                Some(v)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Returns `true` if `key` is resident. Does not count as an access.
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().values.contains_key(key)
    }

    /// Remove a key from the value table and the policy.
    pub fn remove(&self, key: &K) -> bool {
        let mut state = self.state.lock();
        if state.take(key).is_some() {
            state.policy.remove(key);
            true
        } else {
            false
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.values.clear();
        state.policy.clear();
        state.current = 0;
        state.expiring = 0;
    }

    /// Number of resident entries.
    pub fn item_count(&self) -> usize {
        self.state.lock().values.len()
    }

    /// Sum of resident entry sizes in bytes.
    pub fn current_size(&self) -> u64 {
        self.state.lock().current
    }

    /// Configured budget in bytes.
    pub fn budget(&self) -> u64 {
        self.state.lock().budget
    }

    /// Change the budget. Takes effect on the next insert that needs room.
    pub fn set_budget(&self, budget_bytes: u64) {
        self.state.lock().budget = budget_bytes;
    }

    /// Usage count recorded by the policy for `key`.
    pub fn usage(&self, key: &K) -> Option<u64> {
        self.state.lock().policy.usage(key)
    }

    /// Resident keys with their usage counts, least valuable first.
    ///
    /// Replay the entries in order through
    /// [`insert_with_usage`](Self::insert_with_usage) to restore the ranking
    /// under either policy.
    pub fn snapshot(&self) -> Vec<(K, u64)> {
        let state = self.state.lock();
        state
            .policy
            .keys_in_order()
            .into_iter()
            .map(|k| {
                let usage = state.policy.usage(&k).unwrap_or(0);
                (k, usage)
            })
            .collect()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entry_count: state.values.len() as u64,
            hit_count: state.hits,
            miss_count: state.misses,
            eviction_count: state.evictions,
            resident_bytes: state.current,
            budget_bytes: state.budget,
        }
    }

    #[cfg(test)]
    fn set_clock(&mut self, clock: fn() -> u64) {
        self.clock = clock;
    }
}

impl<K, V> CacheState<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Remove an entry from the value table only, fixing up counters.
    fn take(&mut self, key: &K) -> Option<Entry<V>> {
        let entry = self.values.remove(key)?;
        self.current -= entry.size;
        if entry.valid_until != 0 {
            self.expiring -= 1;
        }
        Some(entry)
    }

    fn evict_expired(&mut self, now: u64, evicted: &mut Vec<V>) {
        let expired: Vec<K> = self
            .values
            .iter()
            .filter(|(_, e)| e.valid_until != 0 && now > e.valid_until)
            .map(|(k, _)| k.clone())
            .collect();

        for key in expired {
            if let Some(entry) = self.take(&key) {
                self.policy.remove(&key);
                evicted.push(entry.value);
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
