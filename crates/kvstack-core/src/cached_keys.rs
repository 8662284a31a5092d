//! Key-enumeration caching.
//!
//! [`CachedKeys`] enumerates the inner store once, on first use, and serves
//! `iter_keys`, `contains` and `len` from a container after that. Writes
//! through the wrapper keep the container coherent; writes that bypass it
//! (directly on the inner store) are only seen after [`CachedKeys::refresh`].

use std::collections::{BTreeSet, HashSet};
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{RwLock, RwLockReadGuard};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};
use crate::transform::Transform;

/// A container that can hold a cached key enumeration.
///
/// - `Vec<K>` keeps first-enumeration order; new keys go to the end.
/// - `BTreeSet<K>` keeps keys sorted.
/// - `HashSet<K>` gives constant-time `contains`, in arbitrary order.
pub trait KeyContainer<K>: Sized {
    fn from_keys(keys: Vec<K>) -> Self;

    /// Add `key` unless already present.
    fn insert_key(&mut self, key: K);

    fn remove_key(&mut self, key: &K);

    fn has_key(&self, key: &K) -> bool;

    fn key_count(&self) -> usize;

    fn key_list(&self) -> Vec<K>;
}

impl<K: Clone + PartialEq> KeyContainer<K> for Vec<K> {
    fn from_keys(keys: Vec<K>) -> Self {
        keys
    }

    fn insert_key(&mut self, key: K) {
        if !self.contains(&key) {
            self.push(key);
        }
    }

    fn remove_key(&mut self, key: &K) {
        self.retain(|k| k != key);
    }

    fn has_key(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn key_count(&self) -> usize {
        self.len()
    }

    fn key_list(&self) -> Vec<K> {
        self.clone()
    }
}

impl<K: Clone + Ord> KeyContainer<K> for BTreeSet<K> {
    fn from_keys(keys: Vec<K>) -> Self {
        keys.into_iter().collect()
    }

    fn insert_key(&mut self, key: K) {
        self.insert(key);
    }

    fn remove_key(&mut self, key: &K) {
        self.remove(key);
    }

    fn has_key(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn key_count(&self) -> usize {
        self.len()
    }

    fn key_list(&self) -> Vec<K> {
        self.iter().cloned().collect()
    }
}

impl<K: Clone + Hash + Eq> KeyContainer<K> for HashSet<K> {
    fn from_keys(keys: Vec<K>) -> Self {
        keys.into_iter().collect()
    }

    fn insert_key(&mut self, key: K) {
        self.insert(key);
    }

    fn remove_key(&mut self, key: &K) {
        self.remove(key);
    }

    fn has_key(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn key_count(&self) -> usize {
        self.len()
    }

    fn key_list(&self) -> Vec<K> {
        self.iter().cloned().collect()
    }
}

/// A store whose key enumeration is cached in a `C` container.
pub struct CachedKeys<S, C> {
    store: S,
    keys: RwLock<Option<C>>,
}

impl<S, C> CachedKeys<S, C> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            keys: RwLock::new(None),
        }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Drop the cached enumeration; the next key operation re-reads it.
    pub fn refresh(&self) -> StoreResult<()> {
        *self
            .keys
            .write()
            .map_err(|e| StoreError::poisoned("key cache", e))? = None;
        Ok(())
    }

    /// Whether the enumeration has been cached yet.
    pub fn is_loaded(&self) -> bool {
        self.keys.read().map(|k| k.is_some()).unwrap_or(false)
    }
}

impl<S: Collection, C: KeyContainer<S::Key>> CachedKeys<S, C> {
    /// Read access to the container, filling it first if needed.
    fn loaded(&self) -> StoreResult<RwLockReadGuard<'_, Option<C>>> {
        {
            let guard = self
                .keys
                .read()
                .map_err(|e| StoreError::poisoned("key cache", e))?;
            if guard.is_some() {
                return Ok(guard);
            }
        }

        let keys = self.store.keys()?;
        debug!(count = keys.len(), "caching key enumeration");
        {
            let mut slot = self
                .keys
                .write()
                .map_err(|e| StoreError::poisoned("key cache", e))?;
            if slot.is_none() {
                *slot = Some(C::from_keys(keys));
            }
        }
        self.keys
            .read()
            .map_err(|e| StoreError::poisoned("key cache", e))
    }

    fn with_loaded<T>(&self, f: impl FnOnce(&C) -> T) -> StoreResult<T> {
        let guard = self.loaded()?;
        match guard.as_ref() {
            Some(keys) => Ok(f(keys)),
            None => Err(StoreError::backend(
                "key cache",
                "enumeration dropped while loading",
            )),
        }
    }

    /// Apply `f` to the container if it is loaded. An unloaded cache picks
    /// the change up on its first enumeration anyway.
    fn update_loaded(&self, f: impl FnOnce(&mut C)) -> StoreResult<()> {
        let mut slot = self
            .keys
            .write()
            .map_err(|e| StoreError::poisoned("key cache", e))?;
        if let Some(keys) = slot.as_mut() {
            f(keys);
        }
        Ok(())
    }
}

impl<S, C> Collection for CachedKeys<S, C>
where
    S: Collection,
    C: KeyContainer<S::Key>,
{
    type Key = S::Key;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, S::Key>> {
        let keys = self.with_loaded(|keys| keys.key_list())?;
        Ok(Box::new(keys.into_iter().map(Ok)))
    }

    fn contains(&self, key: &S::Key) -> StoreResult<bool> {
        self.with_loaded(|keys| keys.has_key(key))
    }

    fn len(&self) -> StoreResult<usize> {
        self.with_loaded(|keys| keys.key_count())
    }
}

impl<S, C> Reader for CachedKeys<S, C>
where
    S: Reader,
    C: KeyContainer<S::Key>,
{
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        self.store.get(key)
    }
}

impl<S, C> Persister for CachedKeys<S, C>
where
    S: Persister,
    C: KeyContainer<S::Key>,
{
    fn set(&self, key: S::Key, value: S::Value) -> StoreResult<()> {
        self.store.set(key.clone(), value)?;
        self.update_loaded(|keys| keys.insert_key(key))
    }

    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        self.store.delete(key)?;
        self.update_loaded(|keys| keys.remove_key(key))
    }
}

impl<S: Describe, C> Describe for CachedKeys<S, C> {
    fn layer_name(&self) -> &'static str {
        "CachedKeys"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Debug, C> Debug for CachedKeys<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedKeys")
            .field("store", &self.store)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Reusable key-caching transformation with container type `C`.
pub struct CachedKeysLayer<C> {
    _container: PhantomData<fn() -> C>,
}

impl<C> CachedKeysLayer<C> {
    pub fn new() -> Self {
        Self {
            _container: PhantomData,
        }
    }
}

impl<C> Default for CachedKeysLayer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for CachedKeysLayer<C> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<C> Debug for CachedKeysLayer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CachedKeysLayer")
    }
}

impl<S, C> Transform<S> for CachedKeysLayer<C>
where
    S: Collection,
    C: KeyContainer<S::Key>,
{
    type Output = CachedKeys<S, C>;

    fn apply(&self, store: S) -> CachedKeys<S, C> {
        CachedKeys::new(store)
    }
}

/// Former name of [`CachedKeys`].
#[deprecated(note = "use CachedKeys")]
pub type CacheIter<S, C> = CachedKeys<S, C>;

/// Former entry point of [`CachedKeys`].
#[deprecated(note = "use StoreExt::cached_keys")]
pub fn cache_iter<S, C>(store: S) -> CachedKeys<S, C>
where
    S: Collection,
    C: KeyContainer<S::Key>,
{
    CachedKeys::new(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use std::cell::Cell;

    /// Counts enumerations so tests can see when the cache is used.
    struct Counting {
        inner: MemoryStore<String, u8>,
        scans: Cell<usize>,
    }

    impl Counting {
        fn new(keys: &[&str]) -> Self {
            Self {
                inner: keys.iter().map(|k| (k.to_string(), 0)).collect(),
                scans: Cell::new(0),
            }
        }
    }

    impl Collection for Counting {
        type Key = String;

        fn iter_keys(&self) -> StoreResult<KeyIter<'_, String>> {
            self.scans.set(self.scans.get() + 1);
            self.inner.iter_keys()
        }
    }

    impl Reader for Counting {
        type Value = u8;

        fn get(&self, key: &String) -> StoreResult<u8> {
            self.inner.get(key)
        }
    }

    impl Persister for Counting {
        fn set(&self, key: String, value: u8) -> StoreResult<()> {
            self.inner.set(key, value)
        }

        fn delete(&self, key: &String) -> StoreResult<()> {
            self.inner.delete(key)
        }
    }

    // -----------------------------------------------------------------------
    // Caching
    // -----------------------------------------------------------------------

    #[test]
    fn enumerates_inner_once() {
        let c: CachedKeys<_, Vec<String>> = CachedKeys::new(Counting::new(&["b", "a"]));
        assert!(!c.is_loaded());
        assert_eq!(c.keys().unwrap(), vec!["a", "b"]);
        assert_eq!(c.len().unwrap(), 2);
        assert!(c.contains(&"a".to_string()).unwrap());
        assert_eq!(c.keys().unwrap(), vec!["a", "b"]);
        assert_eq!(c.inner().scans.get(), 1);
    }

    #[test]
    fn refresh_rereads_inner() {
        let c: CachedKeys<_, BTreeSet<String>> = CachedKeys::new(Counting::new(&["a"]));
        c.len().unwrap();
        c.inner().inner.set("z".into(), 1).unwrap();
        assert_eq!(c.len().unwrap(), 1);

        c.refresh().unwrap();
        assert_eq!(c.len().unwrap(), 2);
        assert_eq!(c.inner().scans.get(), 2);
    }

    // -----------------------------------------------------------------------
    // Coherence
    // -----------------------------------------------------------------------

    #[test]
    fn set_and_delete_keep_cache_coherent() {
        let c: CachedKeys<_, Vec<String>> = CachedKeys::new(Counting::new(&["a", "b"]));
        c.keys().unwrap();

        c.set("new".into(), 9).unwrap();
        assert_eq!(c.keys().unwrap(), vec!["a", "b", "new"]);
        // Overwriting does not duplicate.
        c.set("a".into(), 1).unwrap();
        assert_eq!(c.len().unwrap(), 3);

        c.delete(&"b".to_string()).unwrap();
        assert_eq!(c.keys().unwrap(), vec!["a", "new"]);
        assert!(!c.contains(&"b".to_string()).unwrap());
        assert_eq!(c.inner().scans.get(), 1);
    }

    #[test]
    fn failed_delete_leaves_cache_alone() {
        let c: CachedKeys<_, HashSet<String>> = CachedKeys::new(Counting::new(&["a"]));
        c.len().unwrap();
        assert!(c.delete(&"zz".to_string()).unwrap_err().is_key_not_found());
        assert_eq!(c.len().unwrap(), 1);
    }

    #[test]
    fn sorted_container_orders_keys() {
        let c: CachedKeys<_, BTreeSet<u32>> =
            CachedKeys::new(MemoryStore::from_iter([(5u32, ()), (1, ())]));
        c.keys().unwrap();
        c.set(3, ()).unwrap();
        assert_eq!(c.keys().unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn layer_and_deprecated_alias() {
        let layer: CachedKeysLayer<Vec<&str>> = CachedKeysLayer::new();
        let c = layer.apply(MemoryStore::from_iter([("x", 1)]));
        assert_eq!(c.describe(), "CachedKeys<MemoryStore>");
        assert_eq!(c.keys().unwrap(), vec!["x"]);

        #[allow(deprecated)]
        let old: CacheIter<_, Vec<String>> = cache_iter(Counting::new(&["x", "y"]));
        assert_eq!(old.len().unwrap(), 2);
    }
}
