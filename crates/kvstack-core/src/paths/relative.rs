use std::fmt::{self, Debug};

use crate::error::{StoreError, StoreResult};
use crate::hooks::KeyMap;
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};
use crate::transform::Transform;

/// A store seen relative to a key prefix.
///
/// Outgoing keys have the prefix stripped; incoming keys get it prepended.
/// Inner keys without the prefix are outside this view: iteration skips them
/// and `len` does not count them.
pub struct RelativePaths<S> {
    store: S,
    prefix: String,
    prefix_len: usize,
}

impl<S> RelativePaths<S> {
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix_len = prefix.len();
        Self {
            store,
            prefix,
            prefix_len,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    pub fn id_of_key(&self, key: &str) -> String {
        let mut id = String::with_capacity(self.prefix_len + key.len());
        id.push_str(&self.prefix);
        id.push_str(key);
        id
    }

    pub fn key_of_id(&self, id: &str) -> StoreResult<String> {
        if id.starts_with(&self.prefix) {
            Ok(id[self.prefix_len..].to_string())
        } else {
            Err(StoreError::key_not_valid(
                &id,
                format!("outside prefix {:?}", self.prefix),
            ))
        }
    }

    /// The same translation as a reusable key map.
    pub fn key_map(&self) -> KeyMap<String, String> {
        crate::codec::prefix(self.prefix.clone())
    }
}

impl<S: Collection<Key = String>> Collection for RelativePaths<S> {
    type Key = String;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, String>> {
        let ids = self.store.iter_keys()?;
        Ok(Box::new(ids.filter_map(move |id| match id {
            Ok(id) => self.key_of_id(&id).ok().map(Ok),
            Err(e) => Some(Err(e)),
        })))
    }

    fn contains(&self, key: &String) -> StoreResult<bool> {
        self.store.contains(&self.id_of_key(key))
    }
}

impl<S: Reader<Key = String>> Reader for RelativePaths<S> {
    type Value = S::Value;

    fn get(&self, key: &String) -> StoreResult<S::Value> {
        self.store.get(&self.id_of_key(key))
    }
}

impl<S: Persister<Key = String>> Persister for RelativePaths<S> {
    fn set(&self, key: String, value: S::Value) -> StoreResult<()> {
        self.store.set(self.id_of_key(&key), value)
    }

    fn delete(&self, key: &String) -> StoreResult<()> {
        self.store.delete(&self.id_of_key(key))
    }
}

impl<S: Describe> Describe for RelativePaths<S> {
    fn layer_name(&self) -> &'static str {
        "RelativePaths"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Debug> Debug for RelativePaths<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelativePaths")
            .field("prefix", &self.prefix)
            .field("store", &self.store)
            .finish()
    }
}

/// Reusable prefix relativization.
#[derive(Clone, Debug)]
pub struct RelativeLayer {
    prefix: String,
}

impl RelativeLayer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl<S: Collection<Key = String>> Transform<S> for RelativeLayer {
    type Output = RelativePaths<S>;

    fn apply(&self, store: S) -> RelativePaths<S> {
        RelativePaths::new(store, self.prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use proptest::prelude::*;

    fn rooted() -> MemoryStore<String, &'static str> {
        MemoryStore::from_iter([
            ("/root/of/data/foo".to_string(), "bar"),
            ("/root/of/data/too".to_string(), "much"),
        ])
    }

    #[test]
    fn strips_and_prepends_prefix() {
        let s = RelativePaths::new(rooted(), "/root/of/data/");
        assert_eq!(s.keys().unwrap(), vec!["foo", "too"]);
        assert_eq!(s.get(&"foo".to_string()).unwrap(), "bar");

        s.set("new".into(), "v").unwrap();
        assert_eq!(s.inner().get(&"/root/of/data/new".to_string()).unwrap(), "v");
    }

    #[test]
    fn keys_outside_prefix_are_hidden() {
        let inner = rooted();
        inner.set("/elsewhere/x".into(), "no").unwrap();
        let s = RelativePaths::new(inner, "/root/of/data/");
        assert_eq!(s.len().unwrap(), 2);
        assert!(!s.contains(&"/elsewhere/x".to_string()).unwrap());
    }

    #[test]
    fn key_of_id_rejects_foreign_ids() {
        let s = RelativePaths::new(rooted(), "/root/");
        assert!(matches!(
            s.key_of_id("/other/x"),
            Err(StoreError::KeyNotValid { .. })
        ));
        assert_eq!(s.key_map().key_of_id(&"/root/a".into()).unwrap(), "a");
    }

    #[test]
    fn layer_and_describe() {
        let s = RelativeLayer::new("/root/of/").apply(rooted());
        assert_eq!(s.keys().unwrap(), vec!["data/foo", "data/too"]);
        assert_eq!(s.describe(), "RelativePaths<MemoryStore>");
    }

    proptest! {
        #[test]
        fn relativization_is_a_bijection(
            prefix in "[a-z/]{0,8}",
            keys in proptest::collection::btree_set("[a-z0-9/._]{1,12}", 0..10),
        ) {
            let inner: MemoryStore<String, u8> =
                keys.iter().map(|k| (format!("{prefix}{k}"), 0)).collect();
            let s = RelativePaths::new(inner, prefix.clone());
            for k in s.keys().unwrap() {
                let id = s.id_of_key(&k);
                prop_assert!(id.starts_with(&prefix));
                prop_assert_eq!(s.key_of_id(&id).unwrap(), k.clone());
                prop_assert!(s.contains(&k).unwrap());
            }
            prop_assert_eq!(s.len().unwrap(), keys.len());
        }
    }
}
