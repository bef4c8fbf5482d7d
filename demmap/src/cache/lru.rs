//! Least-recently-used eviction.
//!
//! Keys are ordered by a monotonic tick. Inserting or touching a key gives it
//! a fresh tick; the smallest tick is the least recently used key. Ties
//! cannot occur, so eviction order is insertion order among untouched keys.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use super::EvictionPolicy;

/// Evicts the key that was inserted or touched longest ago.
pub struct LruPolicy<K> {
    /// tick -> key, oldest first
    order: BTreeMap<u64, K>,
    /// key -> tick
    ticks: HashMap<K, u64>,
    next_tick: u64,
}

impl<K: Eq + Hash + Clone> LruPolicy<K> {
    /// Create an empty policy.
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            ticks: HashMap::new(),
            next_tick: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        let t = self.next_tick;
        self.next_tick += 1;
        t
    }
}

impl<K: Eq + Hash + Clone> Default for LruPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone + Send> EvictionPolicy<K> for LruPolicy<K> {
    fn insert(&mut self, key: K) {
        if self.ticks.contains_key(&key) {
            self.update(&key);
            return;
        }
        let t = self.tick();
        self.order.insert(t, key.clone());
        self.ticks.insert(key, t);
    }

    /// Recency has no count to restore. Replaying keys in snapshot order
    /// rebuilds the same ranking, since each insert becomes the most recent.
    fn insert_with_usage(&mut self, key: K, _usage: u64) {
        self.insert(key);
    }

    fn update(&mut self, key: &K) {
        let Some(&old) = self.ticks.get(key) else {
            return;
        };
        let t = self.tick();
        if let Some(k) = self.order.remove(&old) {
            self.order.insert(t, k);
        }
        self.ticks.insert(key.clone(), t);
    }

    fn least_key(&self) -> Option<K> {
        self.order.first_key_value().map(|(_, k)| k.clone())
    }

    fn evict(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.ticks.remove(key) {
            Some(t) => {
                self.order.remove(&t);
                true
            }
            None => false,
        }
    }

    fn usage(&self, key: &K) -> Option<u64> {
        // Recency carries no usage count
        self.ticks.get(key).map(|_| 0)
    }

    fn keys_in_order(&self) -> Vec<K> {
        self.order.values().cloned().collect()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.ticks.clear();
    }

    fn len(&self) -> usize {
        self.ticks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_in_insertion_order() {
        let mut lru = LruPolicy::new();
        lru.insert("a");
        lru.insert("b");
        lru.insert("c");

        assert_eq!(lru.evict(), Some("a"));
        assert_eq!(lru.evict(), Some("b"));
        assert_eq!(lru.evict(), Some("c"));
        assert_eq!(lru.evict(), None);
    }

    #[test]
    fn test_update_moves_to_most_recent() {
        let mut lru = LruPolicy::new();
        lru.insert("a");
        lru.insert("b");
        lru.insert("c");

        lru.update(&"a");
        assert_eq!(lru.least_key(), Some("b"));

        lru.update(&"b");
        assert_eq!(lru.least_key(), Some("c"));
    }

    #[test]
    fn test_keys_in_order_follow_recency() {
        let mut lru = LruPolicy::new();
        lru.insert("a");
        lru.insert("b");
        lru.insert("c");
        lru.update(&"a");
        assert_eq!(lru.keys_in_order(), vec!["b", "c", "a"]);

        let mut replayed = LruPolicy::new();
        for k in lru.keys_in_order() {
            replayed.insert_with_usage(k, 0);
        }
        assert_eq!(replayed.keys_in_order(), lru.keys_in_order());
    }

    #[test]
    fn test_remove_specific_key() {
        let mut lru = LruPolicy::new();
        lru.insert(1);
        lru.insert(2);

        assert!(lru.remove(&1));
        assert!(!lru.remove(&1));
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.least_key(), Some(2));
    }

    #[test]
    fn test_update_unknown_key_is_ignored() {
        let mut lru = LruPolicy::new();
        lru.insert(1);
        lru.update(&7);
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.usage(&7), None);
        assert_eq!(lru.usage(&1), Some(0));
    }

    #[test]
    fn test_clear() {
        let mut lru = LruPolicy::new();
        lru.insert(1);
        lru.insert(2);
        lru.clear();
        assert!(lru.is_empty());
        assert_eq!(lru.least_key(), None);
    }
}
