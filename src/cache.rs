//! Caller-owned bounded cache for on-chain values that rarely change.
//!
//! Values such as a factory's proxy creation code are usually constant but can change after an
//! upgrade, so entries are never global and can be dropped explicitly.

use std::hash::Hash;

use schnellru::{ByLength, LruMap};

/// Least-recently-used cache holding at most `capacity` entries
pub struct BoundedCache<K, V>
where
    K: Hash + PartialEq,
{
    entries: LruMap<K, V, ByLength>,
    capacity: u32,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + PartialEq,
    V: Clone,
{
    pub fn new(capacity: u32) -> Self {
        Self {
            entries: LruMap::new(ByLength::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.entries.get(key).map(|value| value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Returns the cached value, computing and storing it on a miss.
    ///
    /// A failed computation leaves the cache untouched.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        f: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = f()?;
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    /// Drops a single entry, returning it if present
    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> std::fmt::Debug for BoundedCache<K, V>
where
    K: Hash + PartialEq,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
