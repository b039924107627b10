//! A `HashMap` wrapper that panics on a double-insert or a remove of a missing
//! key. Used for the differ's `EntityId <-> NetId` bookkeeping (§4.1.1): a
//! violation there can only come from a NetId-assignment bug, never from network
//! input, so panicking is the right failure mode.

use std::collections::HashMap;
use std::collections::hash_map::Iter;
use std::hash::Hash;

#[derive(Debug)]
pub struct CheckedMap<K: Eq + Hash, V> {
    inner: HashMap<K, V>,
}

impl<K: Eq + Hash, V> Default for CheckedMap<K, V> {
    fn default() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + std::fmt::Debug, V> CheckedMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.inner.contains_key(&key) {
            panic!("CheckedMap: duplicate insert for key {key:?}");
        }
        self.inner.insert(key, value);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}
