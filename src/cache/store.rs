//! Entry Store Module
//!
//! Bounded associative storage combining a HashMap with the index-linked LRU
//! list. Lookup, insert, promote and evict are all O(1).

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use tracing::debug;

use crate::cache::{CacheEntry, LruList, MaxSize};

#[derive(Debug)]
struct Slot<V> {
    entry: CacheEntry<V>,
    node: usize,
}

// == Entry Store ==
/// Owns every cached entry of one cache instance.
#[derive(Debug)]
pub struct EntryStore<K, V> {
    /// Key to entry and recency node
    entries: HashMap<K, Slot<V>>,
    /// Recency order
    lru: LruList<K>,
    /// Capacity bound
    maxsize: MaxSize,
}

impl<K, V> EntryStore<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates an empty store bounded by `maxsize`.
    pub fn new(maxsize: MaxSize) -> Self {
        let reserve = maxsize.limit().unwrap_or(0).min(1024);
        Self {
            entries: HashMap::with_capacity(reserve),
            lru: LruList::with_capacity(reserve),
            maxsize,
        }
    }

    // == Get ==
    /// Looks up `key`, promoting it to most recently used.
    ///
    /// Promotion happens whether or not the entry is still fresh; freshness is
    /// the caller's decision.
    pub fn get(&mut self, key: &K) -> Option<&CacheEntry<V>> {
        let slot = self.entries.get(key)?;
        self.lru.touch(slot.node);
        Some(&slot.entry)
    }

    // == Peek ==
    /// Looks up `key` without touching recency.
    #[cfg(test)]
    pub fn peek(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    // == Put ==
    /// Stores `value` under `key`, stamped with `now`, as most recently used.
    ///
    /// Overwriting an existing key never changes the entry count. A new key that
    /// pushes the count over the bound evicts the least recently used entry,
    /// which is returned.
    pub fn put(&mut self, key: K, value: V, now: Instant) -> Option<K> {
        if self.maxsize.retains_nothing() {
            return None;
        }

        if let Some(slot) = self.entries.get_mut(&key) {
            slot.entry = CacheEntry::new(value, now);
            self.lru.touch(slot.node);
            return None;
        }

        let node = self.lru.push_front(key.clone());
        self.entries.insert(
            key,
            Slot {
                entry: CacheEntry::new(value, now),
                node,
            },
        );

        if self.maxsize.is_exceeded_by(self.entries.len()) {
            if let Some(victim) = self.lru.pop_back() {
                self.entries.remove(&victim);
                debug!(maxsize = %self.maxsize, "evicted least recently used entry");
                return Some(victim);
            }
        }
        None
    }

    // == Remove ==
    /// Removes `key`, returning its entry.
    pub fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let slot = self.entries.remove(key)?;
        self.lru.remove(slot.node);
        Some(slot.entry)
    }

    // == Clear ==
    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    /// Keys from most to least recently used.
    #[cfg(test)]
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> {
        self.lru.iter()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn maxsize(&self) -> MaxSize {
        self.maxsize
    }
}
