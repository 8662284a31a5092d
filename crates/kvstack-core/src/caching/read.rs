use std::fmt::{self, Debug};

use tracing::trace;

use crate::error::StoreResult;
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};

/// Read-through memoization of `get` in a cache store.
///
/// A miss reads the inner store and copies the value into the cache; a hit
/// never touches the inner store. There is no invalidation:
/// - `set` writes through to the inner store and leaves the cache as is, so
///   a cached key keeps returning its old value until evicted;
/// - changes made directly on the inner store are not seen for cached keys.
///
/// `delete` removes the key from both. Use [`ReadCached::evict`] to drop a
/// stale entry.
pub struct ReadCached<S, C> {
    store: S,
    cache: C,
}

impl<S, C> ReadCached<S, C> {
    pub fn new(store: S, cache: C) -> Self {
        Self { store, cache }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn into_parts(self) -> (S, C) {
        (self.store, self.cache)
    }
}

impl<S, C> ReadCached<S, C>
where
    S: Reader,
    C: Persister<Key = S::Key, Value = S::Value>,
{
    /// Drop `key` from the cache. Absent keys are not an error.
    pub fn evict(&self, key: &S::Key) -> StoreResult<()> {
        match self.cache.delete(key) {
            Err(e) if e.is_key_not_found() => Ok(()),
            other => other,
        }
    }
}

impl<S, C> Collection for ReadCached<S, C>
where
    S: Collection,
{
    type Key = S::Key;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, S::Key>> {
        self.store.iter_keys()
    }

    fn contains(&self, key: &S::Key) -> StoreResult<bool> {
        self.store.contains(key)
    }

    fn len(&self) -> StoreResult<usize> {
        self.store.len()
    }
}

impl<S, C> Reader for ReadCached<S, C>
where
    S: Reader,
    S::Value: Clone,
    C: Persister<Key = S::Key, Value = S::Value>,
{
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        if let Some(value) = self.cache.get_opt(key)? {
            trace!(?key, "read cache hit");
            return Ok(value);
        }
        trace!(?key, "read cache miss");
        let value = self.store.get(key)?;
        self.cache.set(key.clone(), value.clone())?;
        Ok(value)
    }
}

impl<S, C> Persister for ReadCached<S, C>
where
    S: Persister,
    S::Value: Clone,
    C: Persister<Key = S::Key, Value = S::Value>,
{
    fn set(&self, key: S::Key, value: S::Value) -> StoreResult<()> {
        self.store.set(key, value)
    }

    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        self.store.delete(key)?;
        self.evict(key)
    }
}

impl<S: Describe, C> Describe for ReadCached<S, C> {
    fn layer_name(&self) -> &'static str {
        "ReadCached"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Debug, C: Debug> Debug for ReadCached<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadCached")
            .field("store", &self.store)
            .field("cache", &self.cache)
            .finish()
    }
}
