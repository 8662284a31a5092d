//! Key and value translation hooks.
//!
//! A wrapper translates between its own view (external key `K`, object `O`)
//! and its inner store's view (id `I`, data `D`) through four functions:
//!
//! - `id_of_key: K -> I` and `key_of_id: I -> K` ([`KeyMap`])
//! - `data_of_obj: O -> D` and `obj_of_data: D -> O` ([`ValueMap`])
//!
//! plus the optional key-dependent `preset` (before `data_of_obj`) and
//! `postget` (after `obj_of_data`). [`Hooks`] bundles all of them.
//!
//! Hooks are pure functions held behind `Arc`, so hook records are cheap to
//! clone and can be applied to any number of stores.

use std::fmt;
use std::sync::Arc;

use crate::error::StoreResult;

type KeyFn<A, B> = Arc<dyn Fn(&A) -> StoreResult<B> + Send + Sync>;
type ValueFn<A, B> = Arc<dyn Fn(A) -> StoreResult<B> + Send + Sync>;
type KeyedValueFn<K, A, B> = Arc<dyn Fn(&K, A) -> StoreResult<B> + Send + Sync>;

/// A bijection between external keys `K` and inner ids `I`.
pub struct KeyMap<K, I> {
    id_of_key: KeyFn<K, I>,
    key_of_id: KeyFn<I, K>,
}

impl<K, I> Clone for KeyMap<K, I> {
    fn clone(&self) -> Self {
        Self {
            id_of_key: Arc::clone(&self.id_of_key),
            key_of_id: Arc::clone(&self.key_of_id),
        }
    }
}

impl<K: 'static, I: 'static> KeyMap<K, I> {
    /// Build a key map from fallible conversions. Conversions should fail
    /// with `KeyNotValid` for keys outside the admissible set.
    pub fn new<F, G>(id_of_key: F, key_of_id: G) -> Self
    where
        F: Fn(&K) -> StoreResult<I> + Send + Sync + 'static,
        G: Fn(&I) -> StoreResult<K> + Send + Sync + 'static,
    {
        Self {
            id_of_key: Arc::new(id_of_key),
            key_of_id: Arc::new(key_of_id),
        }
    }

    /// Build a key map from conversions that cannot fail.
    pub fn infallible<F, G>(id_of_key: F, key_of_id: G) -> Self
    where
        F: Fn(&K) -> I + Send + Sync + 'static,
        G: Fn(&I) -> K + Send + Sync + 'static,
    {
        Self::new(move |k| Ok(id_of_key(k)), move |i| Ok(key_of_id(i)))
    }

    pub fn id_of_key(&self, key: &K) -> StoreResult<I> {
        (self.id_of_key)(key)
    }

    pub fn key_of_id(&self, id: &I) -> StoreResult<K> {
        (self.key_of_id)(id)
    }

    /// Stack `inner` below this map: incoming keys pass through `self`
    /// first, outgoing ids through `inner` first.
    pub fn then<J: 'static>(self, inner: KeyMap<I, J>) -> KeyMap<K, J> {
        let (outer_in, outer_out) = (self.id_of_key, self.key_of_id);
        let (inner_in, inner_out) = (inner.id_of_key, inner.key_of_id);
        KeyMap {
            id_of_key: Arc::new(move |k: &K| inner_in(&outer_in(k)?)),
            key_of_id: Arc::new(move |j: &J| outer_out(&inner_out(j)?)),
        }
    }

    /// Swap directions.
    pub fn invert(self) -> KeyMap<I, K> {
        KeyMap {
            id_of_key: self.key_of_id,
            key_of_id: self.id_of_key,
        }
    }
}

impl<K: Clone + 'static> KeyMap<K, K> {
    pub fn identity() -> Self {
        Self::infallible(K::clone, K::clone)
    }
}

impl<K, I> fmt::Debug for KeyMap<K, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMap")
    }
}

/// A codec between external objects `O` and stored data `D`.
pub struct ValueMap<O, D> {
    data_of_obj: ValueFn<O, D>,
    obj_of_data: ValueFn<D, O>,
}

impl<O, D> Clone for ValueMap<O, D> {
    fn clone(&self) -> Self {
        Self {
            data_of_obj: Arc::clone(&self.data_of_obj),
            obj_of_data: Arc::clone(&self.obj_of_data),
        }
    }
}

impl<O: 'static, D: 'static> ValueMap<O, D> {
    pub fn new<F, G>(data_of_obj: F, obj_of_data: G) -> Self
    where
        F: Fn(O) -> StoreResult<D> + Send + Sync + 'static,
        G: Fn(D) -> StoreResult<O> + Send + Sync + 'static,
    {
        Self {
            data_of_obj: Arc::new(data_of_obj),
            obj_of_data: Arc::new(obj_of_data),
        }
    }

    pub fn infallible<F, G>(data_of_obj: F, obj_of_data: G) -> Self
    where
        F: Fn(O) -> D + Send + Sync + 'static,
        G: Fn(D) -> O + Send + Sync + 'static,
    {
        Self::new(move |o| Ok(data_of_obj(o)), move |d| Ok(obj_of_data(d)))
    }

    pub fn data_of_obj(&self, obj: O) -> StoreResult<D> {
        (self.data_of_obj)(obj)
    }

    pub fn obj_of_data(&self, data: D) -> StoreResult<O> {
        (self.obj_of_data)(data)
    }

    /// Stack `inner` below this codec: writes encode with `self` then
    /// `inner`, reads decode with `inner` then `self`.
    pub fn then<E: 'static>(self, inner: ValueMap<D, E>) -> ValueMap<O, E> {
        let (outer_enc, outer_dec) = (self.data_of_obj, self.obj_of_data);
        let (inner_enc, inner_dec) = (inner.data_of_obj, inner.obj_of_data);
        ValueMap {
            data_of_obj: Arc::new(move |o| inner_enc(outer_enc(o)?)),
            obj_of_data: Arc::new(move |e| outer_dec(inner_dec(e)?)),
        }
    }
}

impl<O: 'static> ValueMap<O, O> {
    pub fn identity() -> Self {
        Self::new(Ok, Ok)
    }
}

impl<O, D> fmt::Debug for ValueMap<O, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueMap")
    }
}

/// The full hook record of one wrapper layer.
///
/// Internally the value direction is key-aware so that `preset`/`postget`
/// and stacked records compose exactly:
/// - write: `encode(k, v) = data_of_obj(preset(k, v))`
/// - read: `decode(k, d) = postget(k, obj_of_data(d))`
pub struct Hooks<K, I, O, D> {
    keys: KeyMap<K, I>,
    encode: KeyedValueFn<K, O, D>,
    decode: KeyedValueFn<K, D, O>,
}

impl<K, I, O, D> Clone for Hooks<K, I, O, D> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            encode: Arc::clone(&self.encode),
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<K: 'static, I: 'static, O: 'static, D: 'static> Hooks<K, I, O, D> {
    pub fn new(keys: KeyMap<K, I>, values: ValueMap<O, D>) -> Self {
        let ValueMap {
            data_of_obj,
            obj_of_data,
        } = values;
        Self {
            keys,
            encode: Arc::new(move |_: &K, o| data_of_obj(o)),
            decode: Arc::new(move |_: &K, d| obj_of_data(d)),
        }
    }

    /// Add a key-dependent transform applied to values before `data_of_obj`.
    ///
    /// Successive calls nest: the latest `preset` runs first.
    pub fn preset<F>(self, preset: F) -> Self
    where
        F: Fn(&K, O) -> StoreResult<O> + Send + Sync + 'static,
    {
        let encode = self.encode;
        Self {
            keys: self.keys,
            encode: Arc::new(move |k: &K, o| encode(k, preset(k, o)?)),
            decode: self.decode,
        }
    }

    /// Add a key-dependent transform applied to values after `obj_of_data`.
    ///
    /// Successive calls nest: the latest `postget` runs last.
    pub fn postget<F>(self, postget: F) -> Self
    where
        F: Fn(&K, O) -> StoreResult<O> + Send + Sync + 'static,
    {
        let decode = self.decode;
        Self {
            keys: self.keys,
            encode: self.encode,
            decode: Arc::new(move |k: &K, d| postget(k, decode(k, d)?)),
        }
    }

    pub fn id_of_key(&self, key: &K) -> StoreResult<I> {
        self.keys.id_of_key(key)
    }

    pub fn key_of_id(&self, id: &I) -> StoreResult<K> {
        self.keys.key_of_id(id)
    }

    /// Turn an outgoing value into stored data.
    pub fn encode(&self, key: &K, obj: O) -> StoreResult<D> {
        (self.encode)(key, obj)
    }

    /// Turn stored data into an outgoing value.
    pub fn decode(&self, key: &K, data: D) -> StoreResult<O> {
        (self.decode)(key, data)
    }

    /// Collapse two stacked layers into one record:
    /// `wrap(wrap(s, inner), self)` behaves like `wrap(s, self.then(inner))`.
    pub fn then<J: 'static, E: 'static>(self, inner: Hooks<I, J, D, E>) -> Hooks<K, J, O, E> {
        let outer_keys = self.keys.clone();
        let keys = self.keys.then(inner.keys.clone());

        let (outer_enc, outer_dec) = (self.encode, self.decode);
        let (inner_enc, inner_dec) = (inner.encode, inner.decode);
        let enc_keys = outer_keys.clone();
        Hooks {
            keys,
            encode: Arc::new(move |k: &K, o| {
                let id = enc_keys.id_of_key(k)?;
                inner_enc(&id, outer_enc(k, o)?)
            }),
            decode: Arc::new(move |k: &K, e| {
                let id = outer_keys.id_of_key(k)?;
                outer_dec(k, inner_dec(&id, e)?)
            }),
        }
    }
}

impl<K: 'static, I: 'static, O: 'static> Hooks<K, I, O, O> {
    /// Translate keys only.
    pub fn keys(keys: KeyMap<K, I>) -> Self {
        Self::new(keys, ValueMap::identity())
    }
}

impl<K: Clone + 'static, O: 'static, D: 'static> Hooks<K, K, O, D> {
    /// Translate values only.
    pub fn values(values: ValueMap<O, D>) -> Self {
        Self::new(KeyMap::identity(), values)
    }
}

impl<K: Clone + 'static, V: 'static> Hooks<K, K, V, V> {
    /// Hooks that change nothing.
    pub fn identity() -> Self {
        Self::new(KeyMap::identity(), ValueMap::identity())
    }
}

impl<K, I, O, D> fmt::Debug for Hooks<K, I, O, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hooks")
    }
}
