//! Eviction policy abstraction.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::cache::{LfuPolicy, LruPolicy};
use crate::error::DemError;

/// Bookkeeping that decides which key a [`BoundedCache`](super::BoundedCache)
/// gives up next.
///
/// A policy tracks keys only. The cache owns the values and keeps the two in
/// lockstep: every key in its table is registered here exactly once.
pub trait EvictionPolicy<K>: Send {
    /// Register a new key at its initial rank.
    fn insert(&mut self, key: K);

    /// Register a new key with a restored usage count.
    ///
    /// Used when reloading a persisted cache snapshot. Policies without a
    /// usage notion treat this like [`insert`](Self::insert).
    fn insert_with_usage(&mut self, key: K, usage: u64);

    /// Record an access to `key`. Unknown keys are ignored.
    fn update(&mut self, key: &K);

    /// The key that would be evicted next, if any.
    fn least_key(&self) -> Option<K>;

    /// Remove and return the least valuable key.
    fn evict(&mut self) -> Option<K>;

    /// Remove a specific key. Returns `false` if it was not tracked.
    fn remove(&mut self, key: &K) -> bool;

    /// Usage count of a key, for snapshotting.
    fn usage(&self, key: &K) -> Option<u64>;

    /// All tracked keys in eviction order, least valuable first.
    fn keys_in_order(&self) -> Vec<K>;

    /// Drop all bookkeeping.
    fn clear(&mut self);

    /// Number of tracked keys.
    fn len(&self) -> usize;

    /// Returns `true` if no keys are tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Selects one of the built-in eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    /// Least recently used.
    #[default]
    Lru,
    /// Least frequently used.
    Lfu,
}

impl PolicyKind {
    /// Create a boxed policy of this kind.
    pub fn build<K>(self) -> Box<dyn EvictionPolicy<K>>
    where
        K: Eq + Hash + Clone + Send + 'static,
    {
        match self {
            PolicyKind::Lru => Box::new(LruPolicy::new()),
            PolicyKind::Lfu => Box::new(LfuPolicy::new()),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(PolicyKind::Lru),
            "lfu" => Ok(PolicyKind::Lfu),
            other => Err(DemError::Config(format!(
                "unknown eviction policy '{}' (expected lru or lfu)",
                other
            ))),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Lru => f.write_str("lru"),
            PolicyKind::Lfu => f.write_str("lfu"),
        }
    }
}
