//! Applying transformations to stores.
//!
//! Every transformation has two entry points:
//!
//! - instance mode: a [`StoreExt`] method that wraps one store value,
//!   e.g. `store.no_overwrite()`
//! - class mode: a reusable [`Transform`] value that can be applied to any
//!   number of stores, e.g. `NoOverwriteLayer.apply(store)`
//!
//! Both always build a new wrapper; the inner store is moved in, never
//! modified.

use std::hash::Hash;
use std::sync::Arc;

use crate::aliases::Aliased;
use crate::append::{Appendable, ItemToKv};
use crate::cached_keys::{CachedKeys, KeyContainer};
use crate::caching::read::ReadCached;
use crate::caching::write::WriteCached;
use crate::error::StoreResult;
use crate::filter::FilterKeys;
use crate::guards::{Forbidden, Guard, NoOverwrite, ReadOnly};
use crate::hooks::Hooks;
use crate::paths::nested::NestedPaths;
use crate::paths::path_get::AddPathGet;
use crate::paths::relative::RelativePaths;
use crate::traits::{Collection, Persister, Purge, Reader};
use crate::wrap::Wrap;

/// A reusable store transformation.
pub trait Transform<S> {
    type Output;

    fn apply(&self, store: S) -> Self::Output;
}

/// Two transformations applied in sequence: `first`, then `next` on top.
#[derive(Clone, Debug)]
pub struct Chain<A, B> {
    first: A,
    next: B,
}

impl<A, B> Chain<A, B> {
    pub fn new(first: A, next: B) -> Self {
        Self { first, next }
    }

    /// Add another transformation on top of this chain.
    pub fn and_then<C>(self, next: C) -> Chain<Self, C> {
        Chain::new(self, next)
    }
}

impl<S, A, B> Transform<S> for Chain<A, B>
where
    A: Transform<S>,
    B: Transform<A::Output>,
{
    type Output = B::Output;

    fn apply(&self, store: S) -> B::Output {
        self.next.apply(self.first.apply(store))
    }
}

/// Instance-mode transformations for every collection.
pub trait StoreExt: Collection + Sized {
    /// Apply a reusable transformation.
    fn layer<T: Transform<Self>>(self, transform: &T) -> T::Output {
        transform.apply(self)
    }

    /// Wrap with translation hooks.
    fn wrap<K, O, D>(self, hooks: Hooks<K, Self::Key, O, D>) -> Wrap<Self, K, Self::Key, O, D> {
        Wrap::new(self, hooks)
    }

    /// Expose keys with `prefix` stripped.
    fn relative_to(self, prefix: impl Into<String>) -> RelativePaths<Self>
    where
        Self: Collection<Key = String>,
    {
        RelativePaths::new(self, prefix)
    }

    /// Cache the key enumeration in a `C` container.
    fn cached_keys<C: KeyContainer<Self::Key>>(self) -> CachedKeys<Self, C> {
        CachedKeys::new(self)
    }

    /// Hide keys that fail `pred`.
    fn filter_keys<F>(self, pred: F) -> FilterKeys<Self, F>
    where
        F: Fn(&Self::Key) -> bool,
    {
        FilterKeys::new(self, pred)
    }

    fn guarded(self, forbidden: Forbidden) -> Guard<Self> {
        Guard::new(self, forbidden)
    }

    fn disable_writes(self) -> Guard<Self> {
        Guard::new(self, Forbidden::WRITES)
    }

    fn disable_deletes(self) -> Guard<Self> {
        Guard::new(self, Forbidden::DELETES)
    }

    fn disable_iteration(self) -> Guard<Self> {
        Guard::new(self, Forbidden::ITERATION)
    }

    fn read_only(self) -> ReadOnly<Self>
    where
        Self: Reader,
    {
        ReadOnly::new(self)
    }

    fn no_overwrite(self) -> NoOverwrite<Self>
    where
        Self: Persister,
    {
        NoOverwrite::new(self)
    }

    /// Accept key paths and descend through nested values.
    fn add_path_get(self) -> AddPathGet<Self>
    where
        Self: Reader,
    {
        AddPathGet::new(self)
    }

    /// Accept extra `(alias, canonical)` key names.
    fn with_aliases<I>(self, aliases: I) -> Aliased<Self>
    where
        I: IntoIterator<Item = (Self::Key, Self::Key)>,
        Self::Key: Hash + Eq,
    {
        Aliased::new(self, aliases)
    }

    /// Memoize reads in `cache`.
    fn read_cached<C>(self, cache: C) -> ReadCached<Self, C>
    where
        Self: Reader,
        C: Persister<Key = Self::Key, Value = Self::Value>,
    {
        ReadCached::new(self, cache)
    }

    /// Hold writes in `cache` until `flush_when` holds. The cache is purged
    /// first.
    fn write_cached<C, P>(self, cache: C, flush_when: P) -> StoreResult<WriteCached<Self, C>>
    where
        Self: Persister,
        Self::Value: Clone,
        C: Persister<Key = Self::Key, Value = Self::Value> + Purge,
        P: Fn(&C) -> bool + Send + Sync + 'static,
    {
        WriteCached::new(self, cache, flush_when)
    }

    /// Add `append`/`extend` through an item-to-kv function.
    fn appendable<T>(self, item_to_kv: ItemToKv<T, Self::Key, Self::Value>) -> Appendable<Self, T>
    where
        Self: Persister,
    {
        Appendable::new(self, item_to_kv)
    }

    /// View `/`-separated string keys as a directory tree.
    fn nested(self) -> NestedPaths<Self>
    where
        Self: Reader<Key = String>,
    {
        NestedPaths::new(Arc::new(self))
    }

    /// Move into an `Arc` so several layers can share this store.
    fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl<S: Collection> StoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::{NoOverwriteLayer, ReadOnlyLayer};
    use crate::memory::MemoryStore;
    use crate::traits::Describe;

    fn sample() -> MemoryStore<String, i32> {
        MemoryStore::from_iter([("a".to_string(), 1), ("b".to_string(), 2)])
    }

    // -----------------------------------------------------------------------
    // Class mode
    // -----------------------------------------------------------------------

    #[test]
    fn chained_transforms_stack_in_order() {
        let layer = Chain::new(Forbidden::DELETES, NoOverwriteLayer);
        let store = layer.apply(sample());
        assert_eq!(store.describe(), "NoOverwrite<Guard<MemoryStore>>");

        store.set("c".into(), 3).unwrap();
        assert!(store.set("c".into(), 4).is_err());
        assert!(store.delete(&"a".to_string()).is_err());
    }

    #[test]
    fn one_transform_value_serves_many_stores() {
        let layer = Chain::new(ReadOnlyLayer, Forbidden::ITERATION);
        let first = layer.apply(sample());
        let second = layer.apply(MemoryStore::from_iter([("z".to_string(), 26)]));
        assert_eq!(first.get(&"a".to_string()).unwrap(), 1);
        assert_eq!(second.get(&"z".to_string()).unwrap(), 26);
        assert!(second.keys().is_err());
    }

    #[test]
    fn longer_chains() {
        let layer = Chain::new(Forbidden::DELETES, Forbidden::WRITES).and_then(NoOverwriteLayer);
        let store = layer.apply(sample());
        assert_eq!(store.describe(), "NoOverwrite<Guard<Guard<MemoryStore>>>");
        assert!(store.set("a".into(), 0).unwrap_err().to_string().contains("overwrite"));
        assert!(store.set("new".into(), 0).unwrap_err().is_forbidden(crate::error::Operation::Write));
    }

    // -----------------------------------------------------------------------
    // Instance mode
    // -----------------------------------------------------------------------

    #[test]
    fn extension_methods_compose() {
        let store = sample()
            .filter_keys(|k: &String| k != "b")
            .no_overwrite()
            .disable_deletes();
        assert_eq!(store.keys().unwrap(), vec!["a".to_string()]);
        assert!(store.set("a".into(), 9).is_err());
        assert_eq!(store.describe(), "Guard<NoOverwrite<FilterKeys<MemoryStore>>>");
    }

    #[test]
    fn layer_method_applies_a_transform_value() {
        let store = sample().layer(&NoOverwriteLayer);
        assert!(store.set("a".into(), 5).is_err());
    }

    #[test]
    fn shared_inner_store() {
        let inner = sample().shared();
        let ro = Arc::clone(&inner).read_only();
        inner.set("c".into(), 3).unwrap();
        assert_eq!(ro.get(&"c".to_string()).unwrap(), 3);
        assert!(ro.set("d".into(), 4).is_err());
    }
}
