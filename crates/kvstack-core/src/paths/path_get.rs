use std::fmt::{self, Debug};

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};
use crate::transform::Transform;

/// A single key or a path of keys through nested values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyPath<K> {
    Key(K),
    Path(Vec<K>),
}

impl<K> KeyPath<K> {
    pub fn path<I: IntoIterator<Item = K>>(keys: I) -> Self {
        KeyPath::Path(keys.into_iter().collect())
    }
}

impl<K> From<K> for KeyPath<K> {
    fn from(key: K) -> Self {
        KeyPath::Key(key)
    }
}

/// Values that contain further keyed values.
pub trait Descend<K>: Sized {
    /// The value under `key` inside `self`.
    fn descend(&self, key: &K) -> StoreResult<Self>;
}

/// Objects descend by field name, arrays by decimal index.
impl Descend<String> for Value {
    fn descend(&self, key: &String) -> StoreResult<Value> {
        match self {
            Value::Object(map) => map
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::key_not_found(key)),
            Value::Array(items) => {
                let index: usize = key
                    .parse()
                    .map_err(|_| StoreError::key_not_valid(key, "array index expected"))?;
                items
                    .get(index)
                    .cloned()
                    .ok_or_else(|| StoreError::key_not_found(key))
            }
            _ => Err(StoreError::key_not_valid(key, "cannot descend into a scalar")),
        }
    }
}

/// A reader that also accepts key paths: `get(path [a, b, c])` equals
/// `get(a)` descended into by `b`, then `c`.
///
/// Writes and deletes take single keys only.
pub struct AddPathGet<S> {
    store: S,
}

impl<S> AddPathGet<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }
}

impl<S: Collection> AddPathGet<S> {
    fn single<'k>(&self, key: &'k KeyPath<S::Key>) -> StoreResult<&'k S::Key> {
        match key {
            KeyPath::Key(k) => Ok(k),
            KeyPath::Path(p) if p.len() == 1 => Ok(&p[0]),
            KeyPath::Path(p) => Err(StoreError::key_not_valid(p, "expected a single key")),
        }
    }
}

impl<S: Collection> Collection for AddPathGet<S> {
    type Key = KeyPath<S::Key>;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, KeyPath<S::Key>>> {
        let keys = self.store.iter_keys()?;
        Ok(Box::new(keys.map(|k| k.map(KeyPath::Key))))
    }

    fn contains(&self, key: &KeyPath<S::Key>) -> StoreResult<bool> {
        match self.single(key) {
            Ok(k) => self.store.contains(k),
            Err(_) => Ok(false),
        }
    }

    fn len(&self) -> StoreResult<usize> {
        self.store.len()
    }
}

impl<S> Reader for AddPathGet<S>
where
    S: Reader,
    S::Value: Descend<S::Key>,
{
    type Value = S::Value;

    fn get(&self, key: &KeyPath<S::Key>) -> StoreResult<S::Value> {
        let path = match key {
            KeyPath::Key(k) => return self.store.get(k),
            KeyPath::Path(p) => p,
        };
        let (first, rest) = path
            .split_first()
            .ok_or_else(|| StoreError::key_not_valid(path, "empty key path"))?;
        let mut value = self.store.get(first)?;
        for k in rest {
            value = value.descend(k)?;
        }
        Ok(value)
    }
}

impl<S> Persister for AddPathGet<S>
where
    S: Persister,
    S::Value: Descend<S::Key>,
{
    fn set(&self, key: KeyPath<S::Key>, value: S::Value) -> StoreResult<()> {
        let k = self.single(&key)?.clone();
        self.store.set(k, value)
    }

    fn delete(&self, key: &KeyPath<S::Key>) -> StoreResult<()> {
        self.store.delete(self.single(key)?)
    }
}

impl<S: Describe> Describe for AddPathGet<S> {
    fn layer_name(&self) -> &'static str {
        "AddPathGet"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Debug> Debug for AddPathGet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddPathGet").field("store", &self.store).finish()
    }
}

/// Reusable path-get transformation.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathGetLayer;

impl<S: Reader> Transform<S> for PathGetLayer {
    type Output = AddPathGet<S>;

    fn apply(&self, store: S) -> AddPathGet<S> {
        AddPathGet::new(store)
    }
}

/// A read-only store over the top-level fields of a JSON object.
#[derive(Clone, Debug, Default)]
pub struct JsonStore {
    root: Map<String, Value>,
}

impl JsonStore {
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(StoreError::Codec(format!(
                "expected a JSON object at the root, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_json_str(text: &str) -> StoreResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| StoreError::Codec(format!("json decode: {e}")))?;
        Self::from_value(value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Collection for JsonStore {
    type Key = String;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, String>> {
        Ok(Box::new(self.root.keys().cloned().map(Ok)))
    }

    fn contains(&self, key: &String) -> StoreResult<bool> {
        Ok(self.root.contains_key(key))
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.root.len())
    }
}

impl Reader for JsonStore {
    type Value = Value;

    fn get(&self, key: &String) -> StoreResult<Value> {
        self.root
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::key_not_found(key))
    }
}

impl Describe for JsonStore {
    fn layer_name(&self) -> &'static str {
        "JsonStore"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    fn nested() -> AddPathGet<MemoryStore<String, Value>> {
        AddPathGet::new(MemoryStore::from_iter([(
            "a".to_string(),
            json!({"b": {"c": 42}, "list": [10, 20]}),
        )]))
    }

    fn path(keys: &[&str]) -> KeyPath<String> {
        KeyPath::path(keys.iter().map(|k| k.to_string()))
    }

    #[test]
    fn path_descends_through_values() {
        let s = nested();
        assert_eq!(s.get(&path(&["a", "b", "c"])).unwrap(), json!(42));
        assert_eq!(s.get(&path(&["a", "list", "1"])).unwrap(), json!(20));
        assert_eq!(s.get(&"a".to_string().into()).unwrap()["b"], json!({"c": 42}));
    }

    #[test]
    fn path_errors() {
        let s = nested();
        assert!(s.get(&path(&["a", "x"])).unwrap_err().is_key_not_found());
        assert!(s.get(&path(&["a", "list", "7"])).unwrap_err().is_key_not_found());
        assert!(matches!(
            s.get(&path(&["a", "list", "first"])),
            Err(StoreError::KeyNotValid { .. })
        ));
        assert!(matches!(
            s.get(&path(&["a", "b", "c", "d"])),
            Err(StoreError::KeyNotValid { .. })
        ));
        assert!(matches!(s.get(&path(&[])), Err(StoreError::KeyNotValid { .. })));
    }

    #[test]
    fn keys_and_writes_stay_single() {
        let s = nested();
        assert_eq!(s.keys().unwrap(), vec![KeyPath::Key("a".to_string())]);
        s.set(path(&["z"]), json!(1)).unwrap();
        assert!(s.contains(&"z".to_string().into()).unwrap());
        assert!(matches!(
            s.set(path(&["a", "b"]), json!(0)),
            Err(StoreError::KeyNotValid { .. })
        ));
        assert!(!s.contains(&path(&["a", "b"])).unwrap());
    }

    // -----------------------------------------------------------------------
    // JsonStore
    // -----------------------------------------------------------------------

    #[test]
    fn json_store_reads_top_level_fields() {
        let s = JsonStore::from_json_str(r#"{"x": {"y": [1, 2]}, "n": null}"#).unwrap();
        assert_eq!(s.keys().unwrap(), vec!["n", "x"]);
        assert_eq!(s.get(&"n".to_string()).unwrap(), Value::Null);

        let p = PathGetLayer.apply(s);
        assert_eq!(p.get(&path(&["x", "y", "0"])).unwrap(), json!(1));
        assert_eq!(p.describe(), "AddPathGet<JsonStore>");
    }

    #[test]
    fn json_store_requires_an_object() {
        assert!(matches!(
            JsonStore::from_value(json!([1, 2])),
            Err(StoreError::Codec(msg)) if msg.contains("an array")
        ));
        assert!(JsonStore::from_json_str("{").is_err());
    }
}
