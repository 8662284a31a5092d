//! The store contract: four capability traits, each a strict superset of the
//! previous one.
//!
//! - [`Collection`] -- enumerate keys, test membership, count
//! - [`Reader`] -- plus `get`
//! - [`Persister`] -- plus `set` and `delete`
//! - [`Store`] -- plus a `clear` that always refuses
//!
//! Stores declare a capability by implementing its trait. Wrappers implement a
//! capability exactly when their inner store does, so the compiler does the
//! capability check.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::error::{Operation, StoreError, StoreResult};

/// Boxed key enumeration. Backends that can fail mid-walk yield `Err` items.
pub type KeyIter<'a, K> = Box<dyn Iterator<Item = StoreResult<K>> + 'a>;

/// Boxed `(key, value)` enumeration.
pub type ItemIter<'a, K, V> = Box<dyn Iterator<Item = StoreResult<(K, V)>> + 'a>;

/// A keyed collection.
///
/// Implementations must satisfy:
/// - `iter_keys` yields each key at most once.
/// - every yielded key satisfies `contains`.
/// - `len` equals the number of keys yielded.
///
/// `contains` and `len` fall back to linear scans over `iter_keys`. Backends
/// should override them with direct calls when they can.
pub trait Collection {
    type Key: Clone + PartialEq + Debug;

    /// Enumerate keys in backend-defined order.
    fn iter_keys(&self) -> StoreResult<KeyIter<'_, Self::Key>>;

    fn contains(&self, key: &Self::Key) -> StoreResult<bool> {
        for k in self.iter_keys()? {
            if k? == *key {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn len(&self) -> StoreResult<usize> {
        let mut count = 0;
        for k in self.iter_keys()? {
            k?;
            count += 1;
        }
        Ok(count)
    }

    fn is_empty(&self) -> StoreResult<bool> {
        match self.iter_keys()?.next() {
            None => Ok(true),
            Some(k) => k.map(|_| false),
        }
    }

    /// Collect all keys.
    fn keys(&self) -> StoreResult<Vec<Self::Key>> {
        self.iter_keys()?.collect()
    }
}

/// A collection whose values can be read.
pub trait Reader: Collection {
    type Value;

    /// Read the value at `key`.
    ///
    /// Returns `Err(StoreError::KeyNotFound)` if the key is absent.
    fn get(&self, key: &Self::Key) -> StoreResult<Self::Value>;

    /// Like [`get`](Reader::get), but maps `KeyNotFound` to `Ok(None)`.
    fn get_opt(&self, key: &Self::Key) -> StoreResult<Option<Self::Value>> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_key_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Enumerate `(key, value)` pairs. The first failing read ends the walk
    /// with that error; see [`items_catching`] for the forgiving variant.
    fn items(&self) -> StoreResult<ItemIter<'_, Self::Key, Self::Value>> {
        let keys = self.iter_keys()?;
        Ok(Box::new(keys.map(move |k| {
            let k = k?;
            let v = self.get(&k)?;
            Ok((k, v))
        })))
    }
}

/// A reader that also accepts writes and deletes.
pub trait Persister: Reader {
    /// Write `value` at `key`, replacing any previous value.
    fn set(&self, key: Self::Key, value: Self::Value) -> StoreResult<()>;

    /// Delete `key`.
    ///
    /// Returns `Err(StoreError::KeyNotFound)` if the key is absent.
    fn delete(&self, key: &Self::Key) -> StoreResult<()>;

    /// Write every pair in order. Not transactional: a failure leaves the
    /// earlier writes in place.
    fn update<I>(&self, items: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (Self::Key, Self::Value)>,
        Self: Sized,
    {
        for (k, v) in items {
            self.set(k, v)?;
        }
        Ok(())
    }

    /// Read and delete `key`.
    fn pop(&self, key: &Self::Key) -> StoreResult<Self::Value> {
        let value = self.get(key)?;
        self.delete(key)?;
        Ok(value)
    }
}

/// The full store capability.
///
/// A whole-store `clear` is refused to guard against accidental mass deletion.
/// Use [`Purge`] where wiping a store is intended.
pub trait Store: Persister {
    fn clear(&self) -> StoreResult<()> {
        Err(StoreError::forbidden_op(Operation::Clear))
    }
}

impl<T: Persister + ?Sized> Store for T {}

/// Explicit mass deletion, for scratch stores such as write-back caches.
pub trait Purge {
    fn purge(&self) -> StoreResult<()>;
}

/// Identity hints for a layer of a store stack.
pub trait Describe {
    /// Short name of this layer's type, e.g. `"NoOverwrite"`.
    fn layer_name(&self) -> &'static str;

    /// The full stack, outermost first, e.g. `"NoOverwrite<MemoryStore>"`.
    fn describe(&self) -> String {
        self.layer_name().to_string()
    }
}

/// Format `name<inner>` for wrapper [`Describe::describe`] implementations.
pub fn describe_wrapper(name: &str, inner: &impl Describe) -> String {
    format!("{name}<{}>", inner.describe())
}

/// Key enumeration for interactive completion.
///
/// Blanket-implemented for every collection with displayable keys; it adds
/// nothing to the behavior of the store itself.
pub trait KeyCompletions: Collection
where
    Self::Key: Display,
{
    /// Keys whose display form starts with `prefix`, in store order.
    fn key_completions(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut out = Vec::new();
        for k in self.iter_keys()? {
            let k = k?.to_string();
            if k.starts_with(prefix) {
                out.push(k);
            }
        }
        Ok(out)
    }
}

impl<S: Collection + ?Sized> KeyCompletions for S where S::Key: Display {}

/// Enumerate `(key, value)` pairs, skipping entries whose key or value could
/// not be read.
///
/// Each skipped failure is handed to `on_error` with the key when one is
/// known. Failing to start the enumeration at all is still returned as `Err`.
pub fn items_catching<'a, S, F>(
    store: &'a S,
    mut on_error: F,
) -> StoreResult<impl Iterator<Item = (S::Key, S::Value)> + 'a>
where
    S: Reader + ?Sized,
    F: FnMut(Option<&S::Key>, StoreError) + 'a,
{
    let keys = store.iter_keys()?;
    Ok(keys.filter_map(move |k| match k {
        Err(e) => {
            on_error(None, e);
            None
        }
        Ok(k) => match store.get(&k) {
            Ok(v) => Some((k, v)),
            Err(e) => {
                on_error(Some(&k), e);
                None
            }
        },
    }))
}

// ---------------------------------------------------------------------------
// Shared handles
// ---------------------------------------------------------------------------

impl<S: Collection + ?Sized> Collection for Arc<S> {
    type Key = S::Key;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, Self::Key>> {
        (**self).iter_keys()
    }

    fn contains(&self, key: &Self::Key) -> StoreResult<bool> {
        (**self).contains(key)
    }

    fn len(&self) -> StoreResult<usize> {
        (**self).len()
    }
}

impl<S: Reader + ?Sized> Reader for Arc<S> {
    type Value = S::Value;

    fn get(&self, key: &Self::Key) -> StoreResult<Self::Value> {
        (**self).get(key)
    }
}

impl<S: Persister + ?Sized> Persister for Arc<S> {
    fn set(&self, key: Self::Key, value: Self::Value) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &Self::Key) -> StoreResult<()> {
        (**self).delete(key)
    }
}

impl<S: Purge + ?Sized> Purge for Arc<S> {
    fn purge(&self) -> StoreResult<()> {
        (**self).purge()
    }
}

impl<S: Describe + ?Sized> Describe for Arc<S> {
    fn layer_name(&self) -> &'static str {
        (**self).layer_name()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
