/// Capacity-bounded map that evicts its least recently used entry.
///
/// Recency is a monotonically increasing tick stamped on every `get` and
/// `insert`. Eviction scans for the smallest tick (linear in the entry count).
///
/// A capacity of 0 disables eviction.
///
/// # Example
///
/// ```ignore
/// let mut cache = LruCache::new(2);
/// cache.insert("a", 1);
/// cache.insert("b", 2);
/// cache.get(&"a");                           // "a" is now most recent
/// let evicted = cache.insert("c", 3);        // evicts "b"
/// assert_eq!(evicted, Some(("b", 2)));
/// ```

use std::hash::Hash;
use rustc_hash::FxHashMap;

pub struct LruCache<K, V> {
    entries: FxHashMap<K, (V, u64)>,
    capacity: usize,
    tick: u64,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Create an empty cache holding at most `capacity` entries (0 = unbounded)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity,
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Look up an entry and mark it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.next_tick();
        self.entries.get_mut(key).map(|(value, used)| {
            *used = tick;
            &*value
        })
    }

    /// Look up an entry without touching its recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(value, _)| value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace an entry
    ///
    /// # Returns
    ///
    /// The least recently used entry if the insert pushed the cache over
    /// capacity. Replacing an existing key never evicts.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let tick = self.next_tick();
        let replaced = self.entries.insert(key, (value, tick)).is_some();
        if replaced || self.capacity == 0 || self.entries.len() <= self.capacity {
            return None;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (_, used))| *used)
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&oldest).map(|(value, _)| (oldest, value))
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(value, _)| value)
    }

    /// Remove every entry for which `keep` returns false, returning them
    pub fn extract_if<F: FnMut(&K, &V) -> bool>(&mut self, mut keep: F) -> Vec<(K, V)> {
        let doomed: Vec<K> = self
            .entries
            .iter()
            .filter(|(key, (value, _))| !keep(key, value))
            .map(|(key, _)| key.clone())
            .collect();
        doomed
            .into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|(value, _)| (key, value)))
            .collect()
    }

    /// Remove and return every entry
    pub fn drain(&mut self) -> Vec<(K, V)> {
        self.entries.drain().map(|(key, (value, _))| (key, value)).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries (0 = unbounded)
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "lru_cache_tests.rs"]
mod tests;
