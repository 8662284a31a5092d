//! Append semantics over key-value stores.
//!
//! An [`Appendable`] store turns each appended item into one `(key, value)`
//! pair through an item-to-kv function and writes it. The [`item_kv`]
//! module has ready-made item-to-kv functions for JSON records.

use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::error::StoreResult;
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};

/// Conversion of one item into the pair that stores it.
pub type ItemToKv<T, K, V> = Arc<dyn Fn(T) -> StoreResult<(K, V)> + Send + Sync>;

/// Box an item-to-kv closure.
pub fn item_to_kv<T, K, V, F>(f: F) -> ItemToKv<T, K, V>
where
    F: Fn(T) -> StoreResult<(K, V)> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A store with `append` and `extend`.
pub struct Appendable<S: Reader, T> {
    store: S,
    item_to_kv: ItemToKv<T, S::Key, S::Value>,
}

impl<S: Persister, T> Appendable<S, T> {
    pub fn new(store: S, item_to_kv: ItemToKv<T, S::Key, S::Value>) -> Self {
        Self { store, item_to_kv }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Store `item` and return the key it went to.
    pub fn append(&self, item: T) -> StoreResult<S::Key> {
        let (key, value) = (self.item_to_kv)(item)?;
        self.store.set(key.clone(), value)?;
        Ok(key)
    }

    /// Append every item in order. Items before a failing one stay written.
    pub fn extend<I: IntoIterator<Item = T>>(&self, items: I) -> StoreResult<usize> {
        let mut count = 0;
        for item in items {
            self.append(item)?;
            count += 1;
        }
        Ok(count)
    }
}

impl<S: Reader, T> Collection for Appendable<S, T> {
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

impl<S: Reader, T> Reader for Appendable<S, T> {
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        self.store.get(key)
    }
}

impl<S: Persister, T> Persister for Appendable<S, T> {
    fn set(&self, key: S::Key, value: S::Value) -> StoreResult<()> {
        self.store.set(key, value)
    }

    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        self.store.delete(key)
    }
}

impl<S: Reader + Describe, T> Describe for Appendable<S, T> {
    fn layer_name(&self) -> &'static str {
        "Appendable"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Reader + Debug, T> Debug for Appendable<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Appendable").field("store", &self.store).finish()
    }
}

/// Item-to-kv functions for JSON records.
pub mod item_kv {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde_json::{Map, Value};

    use super::{item_to_kv, ItemToKv};
    use crate::error::{StoreError, StoreResult};
    use crate::paths::template::PathTemplate;

    fn record(item: &Value) -> StoreResult<&Map<String, Value>> {
        item.as_object()
            .ok_or_else(|| StoreError::key_not_valid(item, "item is not a JSON object"))
    }

    fn field<'a>(rec: &'a Map<String, Value>, name: &str) -> StoreResult<&'a Value> {
        rec.get(name)
            .ok_or_else(|| StoreError::key_not_valid(rec, format!("missing field {name:?}")))
    }

    /// Strings as themselves, anything else as JSON text.
    fn as_key_text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Key each item by the text of one of its fields; the value is the
    /// whole item.
    pub fn key_from_field(name: impl Into<String>) -> ItemToKv<Value, String, Value> {
        let name = name.into();
        item_to_kv(move |item: Value| {
            let key = as_key_text(field(record(&item)?, &name)?);
            Ok((key, item))
        })
    }

    /// Key each item by the current UTC time (RFC 3339, nanoseconds).
    pub fn timestamp_key<T: 'static>() -> ItemToKv<T, String, T> {
        timestamp_key_with(Utc::now)
    }

    /// Like [`timestamp_key`], with the time taken from `clock`.
    pub fn timestamp_key_with<T, F>(clock: F) -> ItemToKv<T, String, T>
    where
        T: 'static,
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        item_to_kv(move |item: T| Ok((clock().to_rfc3339_opts(SecondsFormat::Nanos, true), item)))
    }

    /// Key each item by filling `template` with its fields.
    pub fn template_key(template: PathTemplate) -> ItemToKv<Value, String, Value> {
        item_to_kv(move |item: Value| {
            let rec = record(&item)?;
            let mut values = Vec::new();
            for name in template.field_names() {
                values.push(as_key_text(field(rec, &name)?));
            }
            let key = template.format(&values)?;
            Ok((key, item))
        })
    }

    /// Split each item into key fields and data fields.
    ///
    /// The key is the JSON text of an object holding the key fields, with
    /// fields in sorted order so equal records give equal keys. The value
    /// holds `data_fields`, or every non-key field when `data_fields` is
    /// `None`.
    pub fn split_fields(
        key_fields: &[&str],
        data_fields: Option<&[&str]>,
    ) -> ItemToKv<Value, String, Value> {
        let key_fields: Vec<String> = key_fields.iter().map(|s| s.to_string()).collect();
        let data_fields: Option<Vec<String>> =
            data_fields.map(|fs| fs.iter().map(|s| s.to_string()).collect());
        item_to_kv(move |item: Value| {
            let rec = record(&item)?;

            let mut key = Map::new();
            for name in &key_fields {
                key.insert(name.clone(), field(rec, name)?.clone());
            }

            let mut data = Map::new();
            match &data_fields {
                Some(names) => {
                    for name in names {
                        data.insert(name.clone(), field(rec, name)?.clone());
                    }
                }
                None => {
                    for (name, value) in rec {
                        if !key_fields.contains(name) {
                            data.insert(name.clone(), value.clone());
                        }
                    }
                }
            }

            let key_text = serde_json::to_string(&Value::Object(key))
                .map_err(|e| StoreError::Codec(format!("json encode: {e}")))?;
            Ok((key_text, Value::Object(data)))
        })
    }
}
