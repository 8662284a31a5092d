use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{Collection, Describe, KeyIter, Persister, Purge, Reader};

/// In-memory, `BTreeMap`-based store.
///
/// Intended for tests, embedding, and as the cache store behind the caching
/// layers. Entries live behind a `RwLock`; values are cloned on read.
/// Iteration is in key order.
pub struct MemoryStore<K, V> {
    entries: RwLock<BTreeMap<K, V>>,
}

impl<K: Ord, V> MemoryStore<K, V> {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> StoreResult<BTreeMap<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        let map = self.read_map()?;
        Ok(map.clone())
    }

    fn read_map(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, BTreeMap<K, V>>> {
        self.entries
            .read()
            .map_err(|e| StoreError::poisoned("memory store", e))
    }

    fn write_map(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, BTreeMap<K, V>>> {
        self.entries
            .write()
            .map_err(|e| StoreError::poisoned("memory store", e))
    }
}

impl<K: Ord, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for MemoryStore<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl<K: Ord, V> From<BTreeMap<K, V>> for MemoryStore<K, V> {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self {
            entries: RwLock::new(map),
        }
    }
}

impl<K, V> Collection for MemoryStore<K, V>
where
    K: Ord + Clone + Debug,
{
    type Key = K;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, K>> {
        // Keys are copied out so no lock is held while the caller iterates.
        let keys: Vec<K> = self.read_map()?.keys().cloned().collect();
        Ok(Box::new(keys.into_iter().map(Ok)))
    }

    fn contains(&self, key: &K) -> StoreResult<bool> {
        Ok(self.read_map()?.contains_key(key))
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.read_map()?.len())
    }

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_map()?.is_empty())
    }
}

impl<K, V> Reader for MemoryStore<K, V>
where
    K: Ord + Clone + Debug,
    V: Clone,
{
    type Value = V;

    fn get(&self, key: &K) -> StoreResult<V> {
        self.read_map()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::key_not_found(key))
    }
}

impl<K, V> Persister for MemoryStore<K, V>
where
    K: Ord + Clone + Debug,
    V: Clone,
{
    fn set(&self, key: K, value: V) -> StoreResult<()> {
        self.write_map()?.insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &K) -> StoreResult<()> {
        self.write_map()?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::key_not_found(key))
    }
}

impl<K: Ord, V> Purge for MemoryStore<K, V> {
    fn purge(&self) -> StoreResult<()> {
        self.write_map()?.clear();
        Ok(())
    }
}

impl<K, V> Describe for MemoryStore<K, V> {
    fn layer_name(&self) -> &'static str {
        "MemoryStore"
    }
}

impl<K, V> std::fmt::Debug for MemoryStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.entries.read().map(|m| m.len()).ok();
        f.debug_struct("MemoryStore")
            .field("entry_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Store;

    fn sample() -> MemoryStore<String, i32> {
        MemoryStore::from_iter([("x".to_string(), 1), ("y".to_string(), 2)])
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn set_and_get() {
        let store = MemoryStore::new();
        store.set("hello", b"world".to_vec()).unwrap();
        assert_eq!(store.get(&"hello").unwrap(), b"world");
    }

    #[test]
    fn set_replaces() {
        let store = sample();
        store.set("x".into(), 10).unwrap();
        assert_eq!(store.get(&"x".to_string()).unwrap(), 10);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn get_missing_is_key_not_found() {
        let store = sample();
        let err = store.get(&"nope".to_string()).unwrap_err();
        assert!(matches!(err, StoreError::KeyNotFound { ref key } if key == "\"nope\""));
    }

    #[test]
    fn delete_present_and_missing() {
        let store = sample();
        store.delete(&"x".to_string()).unwrap();
        assert!(!store.contains(&"x".to_string()).unwrap());
        assert!(store.delete(&"x".to_string()).unwrap_err().is_key_not_found());
    }

    // -----------------------------------------------------------------------
    // Enumeration
    // -----------------------------------------------------------------------

    #[test]
    fn keys_are_ordered() {
        let store = MemoryStore::from_iter([(3, "c"), (1, "a"), (2, "b")]);
        assert_eq!(store.keys().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn iter_len_contains_agree() {
        let store = sample();
        let keys = store.keys().unwrap();
        assert_eq!(keys.len(), store.len().unwrap());
        for k in &keys {
            assert!(store.contains(k).unwrap());
        }
    }

    #[test]
    fn iteration_does_not_hold_the_lock() {
        let store = sample();
        for k in store.iter_keys().unwrap() {
            let k = k.unwrap();
            store.set(format!("{k}{k}"), 0).unwrap();
        }
        assert_eq!(store.len().unwrap(), 4);
    }

    // -----------------------------------------------------------------------
    // Purge / clear
    // -----------------------------------------------------------------------

    #[test]
    fn purge_removes_all_but_clear_refuses() {
        let store = sample();
        assert!(store.clear().is_err());
        assert_eq!(store.len().unwrap(), 2);

        store.purge().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn snapshot_copies() {
        let store = sample();
        let snap = store.snapshot().unwrap();
        store.set("z".into(), 3).unwrap();
        assert_eq!(snap.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Concurrent read safety
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(sample());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    assert_eq!(store.get(&"y".to_string()).unwrap(), 2);
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let store = sample();
        let debug = format!("{store:?}");
        assert!(debug.contains("MemoryStore"));
        assert!(debug.contains("entry_count"));
    }
}
