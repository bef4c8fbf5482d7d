//! Least-frequently-used eviction.
//!
//! Keys are ordered by `(usage, tick)`. The smallest usage is evicted first;
//! among equal usages the key that reached that count first goes first.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use super::EvictionPolicy;

/// Usage assigned to freshly inserted keys.
const INITIAL_USAGE: u64 = 1;

/// Evicts the key with the fewest recorded accesses.
pub struct LfuPolicy<K> {
    /// (usage, tick) -> key, least used first
    frequencies: BTreeMap<(u64, u64), K>,
    /// key -> position in `frequencies`
    positions: HashMap<K, (u64, u64)>,
    next_tick: u64,
}

impl<K: Eq + Hash + Clone> LfuPolicy<K> {
    /// Create an empty policy.
    pub fn new() -> Self {
        Self {
            frequencies: BTreeMap::new(),
            positions: HashMap::new(),
            next_tick: 0,
        }
    }

    fn place(&mut self, key: K, usage: u64) {
        let pos = (usage, self.next_tick);
        self.next_tick += 1;
        self.frequencies.insert(pos, key.clone());
        self.positions.insert(key, pos);
    }
}

impl<K: Eq + Hash + Clone> Default for LfuPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone + Send> EvictionPolicy<K> for LfuPolicy<K> {
    fn insert(&mut self, key: K) {
        self.insert_with_usage(key, INITIAL_USAGE);
    }

    fn insert_with_usage(&mut self, key: K, usage: u64) {
        if let Some(old) = self.positions.remove(&key) {
            self.frequencies.remove(&old);
        }
        self.place(key, usage);
    }

    fn update(&mut self, key: &K) {
        let Some(old) = self.positions.remove(key) else {
            return;
        };
        if let Some(k) = self.frequencies.remove(&old) {
            self.place(k, old.0.saturating_add(1));
        }
    }

    fn least_key(&self) -> Option<K> {
        self.frequencies.first_key_value().map(|(_, k)| k.clone())
    }

    fn evict(&mut self) -> Option<K> {
        let (_, key) = self.frequencies.pop_first()?;
        self.positions.remove(&key);
        Some(key)
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.positions.remove(key) {
            Some(pos) => {
                self.frequencies.remove(&pos);
                true
            }
            None => false,
        }
    }

    fn usage(&self, key: &K) -> Option<u64> {
        self.positions.get(key).map(|&(usage, _)| usage)
    }

    fn keys_in_order(&self) -> Vec<K> {
        self.frequencies.values().cloned().collect()
    }

    fn clear(&mut self) {
        self.frequencies.clear();
        self.positions.clear();
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_least_used_is_evicted() {
        let mut lfu = LfuPolicy::new();
        lfu.insert("a");
        lfu.insert("b");
        lfu.insert("c");

        lfu.update(&"a");
        lfu.update(&"a");
        lfu.update(&"c");

        assert_eq!(lfu.usage(&"a"), Some(3));
        assert_eq!(lfu.usage(&"b"), Some(1));
        assert_eq!(lfu.usage(&"c"), Some(2));

        assert_eq!(lfu.evict(), Some("b"));
        assert_eq!(lfu.evict(), Some("c"));
        assert_eq!(lfu.evict(), Some("a"));
        assert_eq!(lfu.evict(), None);
    }

    #[test]
    fn test_ties_are_deterministic() {
        let mut lfu = LfuPolicy::new();
        lfu.insert(1);
        lfu.insert(2);
        lfu.insert(3);

        // All at usage 1: the earliest registration goes first
        assert_eq!(lfu.least_key(), Some(1));

        lfu.update(&1);
        lfu.update(&2);
        // 1 and 2 at usage 2 (1 got there first), 3 still at 1
        assert_eq!(lfu.evict(), Some(3));
        assert_eq!(lfu.evict(), Some(1));
        assert_eq!(lfu.evict(), Some(2));
    }

    #[test]
    fn test_insert_with_usage() {
        let mut lfu = LfuPolicy::new();
        lfu.insert_with_usage("hot", 10);
        lfu.insert("cold");

        assert_eq!(lfu.usage(&"hot"), Some(10));
        assert_eq!(lfu.least_key(), Some("cold"));
    }

    #[test]
    fn test_keys_in_order_least_used_first() {
        let mut lfu = LfuPolicy::new();
        lfu.insert("a");
        lfu.insert("b");
        lfu.insert("c");
        lfu.update(&"a");
        lfu.update(&"a");
        lfu.update(&"c");
        assert_eq!(lfu.keys_in_order(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_remove_keeps_maps_in_sync() {
        let mut lfu = LfuPolicy::new();
        lfu.insert(1);
        lfu.insert(2);
        lfu.update(&2);

        assert!(lfu.remove(&2));
        assert!(!lfu.remove(&2));
        assert_eq!(lfu.len(), 1);
        assert_eq!(lfu.frequencies.len(), 1);
        assert_eq!(lfu.usage(&2), None);
    }
}
