//! The base delegating wrapper.
//!
//! [`Wrap`] owns an inner store and a [`Hooks`] record. Every contract method
//! applies the incoming hook, delegates, and applies the outgoing hook:
//!
//! | method        | incoming            | delegation           | outgoing          |
//! |---------------|---------------------|----------------------|-------------------|
//! | `get(k)`      | `id = id_of_key(k)` | `d = inner.get(id)`  | `decode(k, d)`    |
//! | `set(k, v)`   | `id`, `encode(k,v)` | `inner.set(id, d)`   | --                |
//! | `delete(k)`   | `id = id_of_key(k)` | `inner.delete(id)`   | --                |
//! | `iter_keys()` | --                  | `inner.iter_keys()`  | `key_of_id(id)`   |
//! | `contains(k)` | `id = id_of_key(k)` | `inner.contains(id)` | --                |
//! | `len()`       | --                  | `inner.len()`        | --                |
//!
//! Errors from the inner store propagate unchanged.

use std::fmt::{self, Debug};

use crate::error::{StoreError, StoreResult};
use crate::hooks::Hooks;
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};
use crate::transform::Transform;

/// A store seen through a [`Hooks`] record.
///
/// `K`/`O` are the keys and values this wrapper exposes, `I`/`D` the ones of
/// the inner store.
pub struct Wrap<S, K, I, O, D> {
    store: S,
    hooks: Hooks<K, I, O, D>,
}

impl<S, K, I, O, D> Wrap<S, K, I, O, D> {
    pub fn new(store: S, hooks: Hooks<K, I, O, D>) -> Self {
        Self { store, hooks }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn hooks(&self) -> &Hooks<K, I, O, D> {
        &self.hooks
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S, K, I, O, D> Collection for Wrap<S, K, I, O, D>
where
    S: Collection<Key = I>,
    K: Clone + PartialEq + Debug + 'static,
    I: 'static,
    O: 'static,
    D: 'static,
{
    type Key = K;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, K>> {
        let ids = self.store.iter_keys()?;
        Ok(Box::new(
            ids.map(move |id| id.and_then(|id| self.hooks.key_of_id(&id))),
        ))
    }

    fn contains(&self, key: &K) -> StoreResult<bool> {
        match self.hooks.id_of_key(key) {
            Ok(id) => self.store.contains(&id),
            // A key outside the admissible set cannot be present.
            Err(StoreError::KeyNotValid { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn len(&self) -> StoreResult<usize> {
        self.store.len()
    }
}

impl<S, K, I, O, D> Reader for Wrap<S, K, I, O, D>
where
    S: Reader<Key = I, Value = D>,
    K: Clone + PartialEq + Debug + 'static,
    I: 'static,
    O: 'static,
    D: 'static,
{
    type Value = O;

    fn get(&self, key: &K) -> StoreResult<O> {
        let id = self.hooks.id_of_key(key)?;
        let data = self.store.get(&id)?;
        self.hooks.decode(key, data)
    }
}

impl<S, K, I, O, D> Persister for Wrap<S, K, I, O, D>
where
    S: Persister<Key = I, Value = D>,
    K: Clone + PartialEq + Debug + 'static,
    I: 'static,
    O: 'static,
    D: 'static,
{
    fn set(&self, key: K, value: O) -> StoreResult<()> {
        let id = self.hooks.id_of_key(&key)?;
        let data = self.hooks.encode(&key, value)?;
        self.store.set(id, data)
    }

    fn delete(&self, key: &K) -> StoreResult<()> {
        let id = self.hooks.id_of_key(key)?;
        self.store.delete(&id)
    }
}

impl<S: Describe, K, I, O, D> Describe for Wrap<S, K, I, O, D> {
    fn layer_name(&self) -> &'static str {
        "Wrap"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Debug, K, I, O, D> Debug for Wrap<S, K, I, O, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrap")
            .field("store", &self.store)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Applying a hook record to a store is the "wrap KV" transformation.
impl<S, K, I, O, D> Transform<S> for Hooks<K, I, O, D>
where
    S: Collection<Key = I>,
{
    type Output = Wrap<S, K, I, O, D>;

    fn apply(&self, store: S) -> Self::Output {
        Wrap::new(store, self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::hooks::{KeyMap, ValueMap};
    use crate::memory::MemoryStore;
    use proptest::prelude::*;

    fn xy() -> MemoryStore<String, i32> {
        MemoryStore::from_iter([("x".to_string(), 1), ("y".to_string(), 2)])
    }

    // -----------------------------------------------------------------------
    // Identity delegation
    // -----------------------------------------------------------------------

    #[test]
    fn identity_delegation() {
        let w = Wrap::new(xy(), Hooks::identity());
        assert_eq!(w.keys().unwrap(), vec!["x".to_string(), "y".to_string()]);
        assert_eq!(w.get(&"x".to_string()).unwrap(), 1);
        assert_eq!(w.len().unwrap(), 2);
        assert!(w.contains(&"y".to_string()).unwrap());
    }

    #[test]
    fn identity_writes_reach_inner() {
        let w = Wrap::new(xy(), Hooks::identity());
        w.set("z".into(), 3).unwrap();
        w.delete(&"x".to_string()).unwrap();
        assert_eq!(w.inner().keys().unwrap(), vec!["y".to_string(), "z".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Key and value translation
    // -----------------------------------------------------------------------

    #[test]
    fn key_and_value_hooks_apply_in_both_directions() {
        let inner: MemoryStore<String, Vec<u8>> = MemoryStore::new();
        let hooks = Hooks::new(codec::suffix(".txt"), codec::utf8_text());
        let w = Wrap::new(inner, hooks);

        w.set("note".into(), "hello".into()).unwrap();
        assert_eq!(w.inner().get(&"note.txt".to_string()).unwrap(), b"hello");
        assert_eq!(w.get(&"note".to_string()).unwrap(), "hello");
        assert_eq!(w.keys().unwrap(), vec!["note".to_string()]);
    }

    #[test]
    fn missing_key_error_propagates_unchanged() {
        let w = Wrap::new(xy(), Hooks::identity());
        assert!(w.get(&"nope".to_string()).unwrap_err().is_key_not_found());
        assert!(w.delete(&"nope".to_string()).unwrap_err().is_key_not_found());
    }

    #[test]
    fn invalid_key_is_not_contained() {
        let hooks = Hooks::keys(KeyMap::new(
            |k: &String| {
                if k.is_empty() {
                    Err(StoreError::key_not_valid(k, "empty"))
                } else {
                    Ok(k.clone())
                }
            },
            |i: &String| Ok(i.clone()),
        ));
        let w = Wrap::new(xy(), hooks);
        assert!(!w.contains(&String::new()).unwrap());
        assert!(matches!(
            w.get(&String::new()),
            Err(StoreError::KeyNotValid { .. })
        ));
    }

    #[test]
    fn applied_as_transform_to_many_stores() {
        let hooks: Hooks<String, String, i32, i32> =
            Hooks::values(ValueMap::infallible(|v: i32| v * 10, |d: i32| d / 10));
        let a = hooks.apply(xy());
        let b = hooks.apply(xy());
        a.set("x".into(), 5).unwrap();
        assert_eq!(a.inner().get(&"x".to_string()).unwrap(), 50);
        assert_eq!(b.get(&"y".to_string()).unwrap(), 0);
    }

    #[test]
    fn describe_names_the_stack() {
        let w = Wrap::new(
            Wrap::new(xy(), Hooks::<String, String, i32, i32>::identity()),
            Hooks::<String, String, i32, i32>::identity(),
        );
        assert_eq!(w.describe(), "Wrap<Wrap<MemoryStore>>");
    }

    // -----------------------------------------------------------------------
    // Hook composition
    // -----------------------------------------------------------------------

    fn inner_hooks() -> Hooks<String, String, i64, String> {
        Hooks::new(codec::prefix("data/"), ValueMap::new(
            |v: i64| Ok(v.to_string()),
            |s: String| s.parse().map_err(|e| StoreError::Codec(format!("{e}"))),
        ))
        .preset(|k: &String, v: i64| Ok(v + k.len() as i64))
    }

    fn outer_hooks() -> Hooks<String, String, i64, i64> {
        Hooks::new(codec::suffix(".n"), ValueMap::infallible(|v: i64| v * 2, |d: i64| d / 2))
            .postget(|_k: &String, v: i64| Ok(v + 1))
    }

    proptest! {
        #[test]
        fn identity_wrapper_is_observationally_equal(
            entries in proptest::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..12),
            probe in "[a-z]{1,6}",
        ) {
            let plain = MemoryStore::from(entries.clone());
            let wrapped = Wrap::new(MemoryStore::from(entries), Hooks::identity());

            prop_assert_eq!(plain.keys().unwrap(), wrapped.keys().unwrap());
            prop_assert_eq!(plain.len().unwrap(), wrapped.len().unwrap());
            prop_assert_eq!(plain.contains(&probe).unwrap(), wrapped.contains(&probe).unwrap());
            prop_assert_eq!(plain.get_opt(&probe).unwrap(), wrapped.get_opt(&probe).unwrap());
        }

        #[test]
        fn stacked_wraps_equal_composed_hooks(
            writes in proptest::collection::vec(("[a-z]{1,5}", -1000i64..1000), 1..10),
        ) {
            let stacked = Wrap::new(
                Wrap::new(MemoryStore::<String, String>::new(), inner_hooks()),
                outer_hooks(),
            );
            let merged = Wrap::new(
                MemoryStore::<String, String>::new(),
                outer_hooks().then(inner_hooks()),
            );

            for (k, v) in writes {
                stacked.set(k.clone(), v).unwrap();
                merged.set(k.clone(), v).unwrap();
                prop_assert_eq!(stacked.get(&k).unwrap(), merged.get(&k).unwrap());
            }
            prop_assert_eq!(stacked.keys().unwrap(), merged.keys().unwrap());
            prop_assert_eq!(
                stacked.inner().inner().snapshot().unwrap(),
                merged.inner().snapshot().unwrap()
            );
        }
    }
}
