use std::fmt::{self, Debug};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::append::ItemToKv;
use crate::error::{StoreError, StoreResult};
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};

type BufferTest<T> = Box<dyn Fn(&[T]) -> bool + Send + Sync>;
type ToKvs<T, K, V> = Box<dyn Fn(Vec<T>) -> StoreResult<Vec<(K, V)>> + Send + Sync>;

/// Buffers appended items and writes them to a store in batches.
///
/// Items collect in memory until the flush condition holds for the buffer.
/// A flush turns the whole buffer into `(key, value)` pairs and writes them
/// in order. How the buffer becomes pairs is chosen at construction:
/// - [`Aggregator::per_item`]: one pair per item
/// - [`Aggregator::batched`]: any function of the whole buffer
/// - [`Aggregator::grouped`]: one pair per group of items sharing a key
///
/// Reads go to the inner store and see flushed items only.
pub struct Aggregator<S: Reader, T> {
    store: S,
    buffer: Mutex<Vec<T>>,
    flush_when: BufferTest<T>,
    to_kvs: ToKvs<T, S::Key, S::Value>,
}

impl<S, T> Aggregator<S, T>
where
    S: Persister,
    T: 'static,
{
    /// Convert any buffer into pairs with `to_kvs`.
    pub fn batched<F, P>(store: S, to_kvs: F, flush_when: P) -> Self
    where
        F: Fn(Vec<T>) -> StoreResult<Vec<(S::Key, S::Value)>> + Send + Sync + 'static,
        P: Fn(&[T]) -> bool + Send + Sync + 'static,
    {
        Self {
            store,
            buffer: Mutex::new(Vec::new()),
            flush_when: Box::new(flush_when),
            to_kvs: Box::new(to_kvs),
        }
    }

    /// Convert each buffered item on its own.
    pub fn per_item<P>(store: S, item_to_kv: ItemToKv<T, S::Key, S::Value>, flush_when: P) -> Self
    where
        S::Key: 'static,
        S::Value: 'static,
        P: Fn(&[T]) -> bool + Send + Sync + 'static,
    {
        Self::batched(
            store,
            move |items: Vec<T>| items.into_iter().map(|item| item_to_kv(item)).collect(),
            flush_when,
        )
    }

    /// Bucket the buffer by `group_key`, in first-seen order, and write one
    /// pair per bucket with the value `reduce` makes of it.
    pub fn grouped<G, R, P>(store: S, group_key: G, reduce: R, flush_when: P) -> Self
    where
        G: Fn(&T) -> S::Key + Send + Sync + 'static,
        R: Fn(Vec<T>) -> StoreResult<S::Value> + Send + Sync + 'static,
        P: Fn(&[T]) -> bool + Send + Sync + 'static,
    {
        Self::batched(
            store,
            move |items: Vec<T>| {
                let mut groups: Vec<(S::Key, Vec<T>)> = Vec::new();
                for item in items {
                    let key = group_key(&item);
                    match groups.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, bucket)) => bucket.push(item),
                        None => groups.push((key, vec![item])),
                    }
                }
                groups
                    .into_iter()
                    .map(|(key, bucket)| Ok((key, reduce(bucket)?)))
                    .collect()
            },
            flush_when,
        )
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Number of items waiting for the next flush.
    pub fn buffered(&self) -> StoreResult<usize> {
        Ok(self.lock()?.len())
    }

    /// Add an item, flushing if the condition now holds.
    pub fn append(&self, item: T) -> StoreResult<()> {
        let ready = {
            let mut buffer = self.lock()?;
            buffer.push(item);
            (self.flush_when)(buffer.as_slice())
        };
        if ready {
            self.flush()?;
        }
        Ok(())
    }

    /// Append every item in order.
    pub fn extend<I: IntoIterator<Item = T>>(&self, items: I) -> StoreResult<()> {
        for item in items {
            self.append(item)?;
        }
        Ok(())
    }

    /// Write out the buffer. Returns the number of pairs written.
    ///
    /// The buffer is emptied first. If conversion fails the items are
    /// dropped; if a write fails the pairs before it stay written.
    pub fn flush(&self) -> StoreResult<usize> {
        let items = std::mem::take(&mut *self.lock()?);
        if items.is_empty() {
            return Ok(0);
        }
        let item_count = items.len();
        let kvs = match (self.to_kvs)(items) {
            Ok(kvs) => kvs,
            Err(e) => {
                warn!(items = item_count, error = %e, "aggregate conversion failed");
                return Err(e);
            }
        };
        let count = kvs.len();
        for (key, value) in kvs {
            self.store.set(key, value)?;
        }
        debug!(items = item_count, pairs = count, "flushed aggregate buffer");
        Ok(count)
    }

    /// Run `work`, then flush, whichever way `work` ends.
    pub fn with_scope<R, F>(&self, work: F) -> StoreResult<R>
    where
        F: FnOnce(&Self) -> StoreResult<R>,
    {
        let outcome = work(self);
        let flushed = self.flush();
        match (outcome, flushed) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(flush_err)) => {
                warn!(error = %flush_err, "flush failed while leaving aggregate scope");
                Err(e)
            }
        }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Vec<T>>> {
        self.buffer
            .lock()
            .map_err(|e| StoreError::poisoned("aggregate buffer", e))
    }
}

impl<S: Reader, T> Collection for Aggregator<S, T> {
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

impl<S: Reader, T> Reader for Aggregator<S, T> {
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        self.store.get(key)
    }
}

impl<S: Reader + Describe, T> Describe for Aggregator<S, T> {
    fn layer_name(&self) -> &'static str {
        "Aggregator"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Reader + Debug, T> Debug for Aggregator<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffered = self.buffer.lock().map(|b| b.len()).ok();
        f.debug_struct("Aggregator")
            .field("store", &self.store)
            .field("buffered", &buffered)
            .finish()
    }
}

/// Flush condition: at least `n` items buffered.
pub fn buffer_len_at_least<T>(n: usize) -> impl Fn(&[T]) -> bool + Send + Sync {
    move |items: &[T]| items.len() >= n
}
