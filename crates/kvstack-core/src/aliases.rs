use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};
use crate::transform::Transform;

/// A store that accepts extra names for some of its keys.
///
/// Every alias resolves to one canonical key before reaching the inner
/// store, so reads, writes and deletes through an alias act on the canonical
/// entry. Aliases resolve one level deep and never appear in iteration.
pub struct Aliased<S: Collection> {
    store: S,
    aliases: Arc<HashMap<S::Key, S::Key>>,
}

impl<S> Aliased<S>
where
    S: Collection,
    S::Key: Hash + Eq,
{
    /// Build from `(alias, canonical)` pairs.
    pub fn new<I>(store: S, aliases: I) -> Self
    where
        I: IntoIterator<Item = (S::Key, S::Key)>,
    {
        Self {
            store,
            aliases: Arc::new(aliases.into_iter().collect()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// The canonical key `key` stands for.
    pub fn resolve(&self, key: &S::Key) -> S::Key {
        self.aliases.get(key).unwrap_or(key).clone()
    }

    /// Every alias of `canonical`.
    pub fn aliases_of(&self, canonical: &S::Key) -> Vec<S::Key> {
        self.aliases
            .iter()
            .filter(|(_, c)| *c == canonical)
            .map(|(a, _)| a.clone())
            .collect()
    }
}

impl<S> Collection for Aliased<S>
where
    S: Collection,
    S::Key: Hash + Eq,
{
    type Key = S::Key;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, S::Key>> {
        self.store.iter_keys()
    }

    fn contains(&self, key: &S::Key) -> StoreResult<bool> {
        self.store.contains(&self.resolve(key))
    }

    fn len(&self) -> StoreResult<usize> {
        self.store.len()
    }
}

impl<S> Reader for Aliased<S>
where
    S: Reader,
    S::Key: Hash + Eq,
{
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        self.store.get(&self.resolve(key))
    }
}

impl<S> Persister for Aliased<S>
where
    S: Persister,
    S::Key: Hash + Eq,
{
    fn set(&self, key: S::Key, value: S::Value) -> StoreResult<()> {
        self.store.set(self.resolve(&key), value)
    }

    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        self.store.delete(&self.resolve(key))
    }
}

impl<S: Collection + Describe> Describe for Aliased<S> {
    fn layer_name(&self) -> &'static str {
        "Aliased"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Collection + Debug> Debug for Aliased<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aliased")
            .field("store", &self.store)
            .field("aliases", &self.aliases.len())
            .finish()
    }
}

/// Reusable aliasing transformation; every store shares one alias table.
#[derive(Debug)]
pub struct AliasLayer<K> {
    aliases: Arc<HashMap<K, K>>,
}

impl<K: Hash + Eq> AliasLayer<K> {
    pub fn new<I: IntoIterator<Item = (K, K)>>(aliases: I) -> Self {
        Self {
            aliases: Arc::new(aliases.into_iter().collect()),
        }
    }
}

impl<K> Clone for AliasLayer<K> {
    fn clone(&self) -> Self {
        Self {
            aliases: Arc::clone(&self.aliases),
        }
    }
}

impl<S> Transform<S> for AliasLayer<S::Key>
where
    S: Collection,
    S::Key: Hash + Eq,
{
    type Output = Aliased<S>;

    fn apply(&self, store: S) -> Aliased<S> {
        Aliased {
            store,
            aliases: Arc::clone(&self.aliases),
        }
    }
}
