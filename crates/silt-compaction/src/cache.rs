//! Fixed-capacity lookup cache with first-in-first-out eviction.
//!
//! Eviction order follows insertion only; reads never refresh an entry.
//! Keys are kept in a slot arena walked by a front pointer, so evicting the
//! oldest entry does not shift the remaining keys.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Slots consumed at the front before the arena is rebuilt.
const MIN_REBUILD: usize = 16;

/// Bounded map with FIFO eviction.
#[derive(Clone, Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    /// Value plus the slot holding its key.
    map: HashMap<K, (V, usize)>,
    /// Keys in insertion order. `None` marks an evicted or removed key.
    slots: Vec<Option<K>>,
    /// First slot that may still hold a key.
    front: usize,
}

impl<K, V> BoundedCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero disables caching: inserts are ignored.
    pub fn new(capacity: usize) -> Self {
        BoundedCache {
            capacity,
            map: HashMap::with_capacity(capacity.min(4096)),
            slots: Vec::new(),
            front: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).map(|(value, _)| value)
    }

    /// Insert a value unless the key is already cached.
    ///
    /// The first value stored for a key wins. When the cache is full the
    /// oldest entry is evicted first. Returns whether the value was stored.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if self.capacity == 0 || self.map.contains_key(&key) {
            return false;
        }
        if self.map.len() >= self.capacity {
            self.evict_oldest();
        }

        let slot = self.slots.len();
        self.slots.push(Some(key.clone()));
        self.map.insert(key, (value, slot));

        if self.slots.len() - self.front > self.capacity.saturating_mul(2).max(MIN_REBUILD) {
            // Removals left too many holes behind the front
            self.rebuild();
        }
        true
    }

    /// Evict the entry that was inserted first.
    pub fn evict_oldest(&mut self) -> Option<(K, V)> {
        while self.front < self.slots.len() {
            let slot = self.front;
            self.front += 1;

            if let Some(key) = self.slots[slot].take() {
                if let Some((value, _)) = self.map.remove(&key) {
                    if self.front >= MIN_REBUILD && self.front * 2 >= self.slots.len() {
                        self.rebuild();
                    }
                    return Some((key, value));
                }
            }
        }
        None
    }

    /// The key that would be evicted next.
    pub fn oldest(&self) -> Option<&K> {
        self.slots[self.front..].iter().flatten().next()
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (value, slot) = self.map.remove(key)?;
        self.slots[slot] = None;
        Some(value)
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.front = 0;
    }

    /// Compact the arena so live keys start at slot zero.
    fn rebuild(&mut self) {
        let live: Vec<K> = self.slots.drain(self.front..).flatten().collect();
        self.slots.clear();
        self.front = 0;

        for (slot, key) in live.into_iter().enumerate() {
            if let Some(entry) = self.map.get_mut(&key) {
                entry.1 = slot;
            }
            self.slots.push(Some(key));
        }
    }
}
