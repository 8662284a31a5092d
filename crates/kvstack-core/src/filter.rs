use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};
use crate::transform::Transform;

/// A store restricted to the keys accepted by a predicate.
///
/// Excluded keys are invisible: iteration skips them, `contains` is false,
/// `get` and `delete` fail with `KeyNotFound`. Writing an excluded key fails
/// with `KeyNotValid`, since the write could never be read back.
pub struct FilterKeys<S, F> {
    store: S,
    pred: Arc<F>,
}

impl<S, F> FilterKeys<S, F> {
    pub fn new(store: S, pred: F) -> Self {
        Self {
            store,
            pred: Arc::new(pred),
        }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }
}

impl<S: Collection, F: Fn(&S::Key) -> bool> FilterKeys<S, F> {
    fn admits(&self, key: &S::Key) -> bool {
        (self.pred)(key)
    }
}

impl<S, F> Collection for FilterKeys<S, F>
where
    S: Collection,
    F: Fn(&S::Key) -> bool,
{
    type Key = S::Key;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, S::Key>> {
        let keys = self.store.iter_keys()?;
        Ok(Box::new(keys.filter(move |k| match k {
            Ok(k) => self.admits(k),
            Err(_) => true,
        })))
    }

    fn contains(&self, key: &S::Key) -> StoreResult<bool> {
        if !self.admits(key) {
            return Ok(false);
        }
        self.store.contains(key)
    }
}

impl<S, F> Reader for FilterKeys<S, F>
where
    S: Reader,
    F: Fn(&S::Key) -> bool,
{
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        if !self.admits(key) {
            return Err(StoreError::key_not_found(key));
        }
        self.store.get(key)
    }
}

impl<S, F> Persister for FilterKeys<S, F>
where
    S: Persister,
    F: Fn(&S::Key) -> bool,
{
    fn set(&self, key: S::Key, value: S::Value) -> StoreResult<()> {
        if !self.admits(&key) {
            return Err(StoreError::key_not_valid(&key, "excluded by key filter"));
        }
        self.store.set(key, value)
    }

    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        if !self.admits(key) {
            return Err(StoreError::key_not_found(key));
        }
        self.store.delete(key)
    }
}

impl<S: Describe, F> Describe for FilterKeys<S, F> {
    fn layer_name(&self) -> &'static str {
        "FilterKeys"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Debug, F> Debug for FilterKeys<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterKeys").field("store", &self.store).finish()
    }
}

/// Reusable key filter. Every store it is applied to shares the predicate.
pub struct FilterLayer<F> {
    pred: Arc<F>,
}

impl<F> FilterLayer<F> {
    pub fn new(pred: F) -> Self {
        Self {
            pred: Arc::new(pred),
        }
    }
}

impl<F> Clone for FilterLayer<F> {
    fn clone(&self) -> Self {
        Self {
            pred: Arc::clone(&self.pred),
        }
    }
}

impl<S, F> Transform<S> for FilterLayer<F>
where
    S: Collection,
    F: Fn(&S::Key) -> bool,
{
    type Output = FilterKeys<S, F>;

    fn apply(&self, store: S) -> FilterKeys<S, F> {
        FilterKeys {
            store,
            pred: Arc::clone(&self.pred),
        }
    }
}
