use std::fmt::{self, Debug};

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Purge, Reader};

type FlushWhen<C> = Box<dyn Fn(&C) -> bool + Send + Sync>;

/// Write-back caching: writes collect in a cache store and reach the inner
/// store in batches.
///
/// After every `set` the flush predicate is asked about the cache; when it
/// holds, every pending entry is forwarded to the inner store and the cache
/// is purged. Reads see pending writes first. The cache is purged on
/// construction, so entries left from earlier use are never flushed.
///
/// Use [`WriteCached::with_scope`] to flush on leaving a block of work.
pub struct WriteCached<S, C> {
    store: S,
    cache: C,
    flush_when: FlushWhen<C>,
}

impl<S, C> WriteCached<S, C>
where
    S: Persister,
    S::Value: Clone,
    C: Persister<Key = S::Key, Value = S::Value> + Purge,
{
    pub fn new<P>(store: S, cache: C, flush_when: P) -> StoreResult<Self>
    where
        P: Fn(&C) -> bool + Send + Sync + 'static,
    {
        cache.purge()?;
        Ok(Self {
            store,
            cache,
            flush_when: Box::new(flush_when),
        })
    }

    /// Forward every pending entry to the inner store, then purge the cache.
    /// Returns the number of entries written.
    ///
    /// If a write fails the cache is left intact; the entries already
    /// forwarded are written again by the next flush.
    pub fn flush(&self) -> StoreResult<usize> {
        let keys = self.cache.keys()?;
        for key in &keys {
            let value = self.cache.get(key)?;
            self.store.set(key.clone(), value)?;
        }
        self.cache.purge()?;
        if !keys.is_empty() {
            debug!(count = keys.len(), "flushed pending writes");
        }
        Ok(keys.len())
    }

    /// Number of writes waiting for the next flush.
    pub fn pending(&self) -> StoreResult<usize> {
        self.cache.len()
    }

    /// Run `work` against this store, then flush, whichever way `work` ends.
    ///
    /// An error from `work` wins over a failed flush; the flush error is
    /// logged.
    pub fn with_scope<R, F>(&self, work: F) -> StoreResult<R>
    where
        F: FnOnce(&Self) -> StoreResult<R>,
    {
        let outcome = work(self);
        let flushed = self.flush();
        match (outcome, flushed) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(flush_err)) => {
                warn!(error = %flush_err, "flush failed while leaving write-back scope");
                Err(e)
            }
        }
    }

    /// Flush and hand back the inner store and the (empty) cache.
    pub fn finish(self) -> StoreResult<(S, C)> {
        self.flush()?;
        Ok((self.store, self.cache))
    }
}

impl<S, C> WriteCached<S, C> {
    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<S, C> Collection for WriteCached<S, C>
where
    S: Collection,
    C: Collection<Key = S::Key>,
{
    type Key = S::Key;

    /// Pending keys first, then flushed keys not pending.
    fn iter_keys(&self) -> StoreResult<KeyIter<'_, S::Key>> {
        let pending = self.cache.keys()?;
        let flushed = self.store.iter_keys()?;
        let rest = flushed.filter(move |k| match k {
            Ok(k) => !matches!(self.cache.contains(k), Ok(true)),
            Err(_) => true,
        });
        Ok(Box::new(pending.into_iter().map(Ok).chain(rest)))
    }

    fn contains(&self, key: &S::Key) -> StoreResult<bool> {
        Ok(self.cache.contains(key)? || self.store.contains(key)?)
    }
}

impl<S, C> Reader for WriteCached<S, C>
where
    S: Reader,
    C: Reader<Key = S::Key, Value = S::Value>,
{
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        match self.cache.get_opt(key)? {
            Some(value) => Ok(value),
            None => self.store.get(key),
        }
    }
}

impl<S, C> Persister for WriteCached<S, C>
where
    S: Persister,
    S::Value: Clone,
    C: Persister<Key = S::Key, Value = S::Value> + Purge,
{
    fn set(&self, key: S::Key, value: S::Value) -> StoreResult<()> {
        self.cache.set(key, value)?;
        if (self.flush_when)(&self.cache) {
            self.flush()?;
        }
        Ok(())
    }

    /// Deletes the pending entry and the flushed one, whichever exist.
    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        let pending = absent_ok(self.cache.delete(key))?;
        let flushed = absent_ok(self.store.delete(key))?;
        if pending || flushed {
            Ok(())
        } else {
            Err(StoreError::key_not_found(key))
        }
    }
}

/// `Ok(true)` if deleted, `Ok(false)` if it was not there.
fn absent_ok(result: StoreResult<()>) -> StoreResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_key_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

impl<S: Describe, C> Describe for WriteCached<S, C> {
    fn layer_name(&self) -> &'static str {
        "WriteCached"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Debug, C: Debug> Debug for WriteCached<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteCached")
            .field("store", &self.store)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Flush predicate: at least `n` entries pending.
pub fn flush_when_len_at_least<C: Collection>(n: usize) -> impl Fn(&C) -> bool + Send + Sync {
    move |cache: &C| match cache.len() {
        Ok(len) => len >= n,
        Err(e) => {
            warn!(error = %e, "cannot size write-back cache, not flushing");
            false
        }
    }
}

/// Flush predicate that never fires; flushing is left to scopes and
/// explicit [`WriteCached::flush`] calls.
pub fn flush_manually<C>() -> impl Fn(&C) -> bool + Send + Sync {
    |_: &C| false
}

/// Attaches [`Purge`] to any persister by deleting its keys one by one.
#[derive(Debug)]
pub struct WithPurge<S> {
    store: S,
}

impl<S> WithPurge<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }
}

impl<S: Collection> Collection for WithPurge<S> {
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

impl<S: Reader> Reader for WithPurge<S> {
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        self.store.get(key)
    }
}

impl<S: Persister> Persister for WithPurge<S> {
    fn set(&self, key: S::Key, value: S::Value) -> StoreResult<()> {
        self.store.set(key, value)
    }

    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        self.store.delete(key)
    }
}

impl<S: Persister> Purge for WithPurge<S> {
    fn purge(&self) -> StoreResult<()> {
        for key in self.store.keys()? {
            absent_ok(self.store.delete(&key))?;
        }
        Ok(())
    }
}

impl<S: Describe> Describe for WithPurge<S> {
    fn layer_name(&self) -> &'static str {
        "WithPurge"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;
    use crate::guards::Guard;
    use crate::guards::Forbidden;
    use crate::memory::MemoryStore;

    type Mem = MemoryStore<u32, String>;

    fn every_three() -> impl Fn(&Mem) -> bool + Send + Sync {
        flush_when_len_at_least::<Mem>(3)
    }

    // -----------------------------------------------------------------------
    // Flushing
    // -----------------------------------------------------------------------

    #[test]
    fn flushes_in_batches_of_three() {
        let w = WriteCached::new(Mem::new(), Mem::new(), every_three()).unwrap();
        for i in 0..7u32 {
            w.set(i, format!("v{i}")).unwrap();
            if i == 2 {
                assert_eq!(w.inner().keys().unwrap(), vec![0, 1, 2]);
            }
        }
        assert_eq!(w.inner().keys().unwrap(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(w.cache().keys().unwrap(), vec![6]);
        assert_eq!(w.pending().unwrap(), 1);
    }

    #[test]
    fn construction_purges_stale_cache() {
        let stale = Mem::from_iter([(99, "old".to_string())]);
        let w = WriteCached::new(Mem::new(), stale, flush_manually::<Mem>()).unwrap();
        assert_eq!(w.flush().unwrap(), 0);
        assert!(w.inner().is_empty().unwrap());
    }

    #[test]
    fn scope_exit_flushes_everything() {
        let w = WriteCached::new(Mem::new(), Mem::new(), flush_manually::<Mem>()).unwrap();
        let n = w
            .with_scope(|w| {
                for i in 0..4u32 {
                    w.set(i, i.to_string())?;
                }
                assert!(w.inner().is_empty()?);
                Ok(4)
            })
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(w.inner().len().unwrap(), 4);
        assert!(w.cache().is_empty().unwrap());
    }

    #[test]
    fn scope_flushes_even_when_work_fails() {
        let w = WriteCached::new(Mem::new(), Mem::new(), flush_manually::<Mem>()).unwrap();
        let err = w
            .with_scope(|w| -> StoreResult<()> {
                w.set(1, "one".into())?;
                Err(StoreError::Codec("boom".into()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)));
        assert_eq!(w.inner().get(&1).unwrap(), "one");
    }

    #[test]
    fn work_error_wins_over_flush_error() {
        let inner = Guard::new(Mem::new(), Forbidden::WRITES);
        let w = WriteCached::new(inner, Mem::new(), flush_manually::<Mem>()).unwrap();
        let err = w
            .with_scope(|w| -> StoreResult<()> {
                w.set(1, "one".into())?;
                Err(StoreError::Codec("first".into()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)));
        // The failed flush kept the pending entry.
        assert_eq!(w.pending().unwrap(), 1);

        assert!(w.flush().unwrap_err().is_forbidden(Operation::Write));
    }

    #[test]
    fn finish_returns_flushed_store() {
        let w = WriteCached::new(Mem::new(), Mem::new(), flush_manually::<Mem>()).unwrap();
        w.set(5, "five".into()).unwrap();
        let (inner, cache) = w.finish().unwrap();
        assert_eq!(inner.get(&5).unwrap(), "five");
        assert!(cache.is_empty().unwrap());
    }

    struct Unlistable;

    impl Collection for Unlistable {
        type Key = u32;

        fn iter_keys(&self) -> StoreResult<KeyIter<'_, u32>> {
            Err(StoreError::backend(
                "listing",
                std::io::Error::new(std::io::ErrorKind::Other, "offline"),
            ))
        }
    }

    #[test]
    fn unsizable_cache_does_not_flush() {
        let at_least_one = flush_when_len_at_least::<Unlistable>(1);
        assert!(!at_least_one(&Unlistable));
        assert!(flush_when_len_at_least::<Mem>(1)(&Mem::from_iter([(1, "x".to_string())])));
    }

    // -----------------------------------------------------------------------
    // Reads over pending and flushed entries
    // -----------------------------------------------------------------------

    #[test]
    fn reads_see_pending_first() {
        let inner = Mem::from_iter([(1, "flushed".to_string()), (2, "two".to_string())]);
        let w = WriteCached::new(inner, Mem::new(), flush_manually::<Mem>()).unwrap();
        w.set(1, "pending".into()).unwrap();
        w.set(3, "three".into()).unwrap();

        assert_eq!(w.get(&1).unwrap(), "pending");
        assert_eq!(w.get(&2).unwrap(), "two");
        assert_eq!(w.keys().unwrap(), vec![1, 3, 2]);
        assert_eq!(w.len().unwrap(), 3);
        assert!(w.contains(&3).unwrap());
    }

    #[test]
    fn delete_removes_pending_and_flushed() {
        let inner = Mem::from_iter([(1, "old".to_string())]);
        let w = WriteCached::new(inner, Mem::new(), flush_manually::<Mem>()).unwrap();
        w.set(1, "new".into()).unwrap();
        w.delete(&1).unwrap();
        assert!(!w.contains(&1).unwrap());
        assert!(w.delete(&1).unwrap_err().is_key_not_found());
    }

    // -----------------------------------------------------------------------
    // WithPurge
    // -----------------------------------------------------------------------

    #[test]
    fn with_purge_deletes_every_key() {
        let p = WithPurge::new(Guard::new(Mem::from_iter([(1, "a".to_string())]), Forbidden::NONE));
        p.purge().unwrap();
        assert!(p.is_empty().unwrap());

        // A guarded store has no Purge of its own; WithPurge makes it a cache.
        let w = WriteCached::new(Mem::new(), p, |_: &WithPurge<Guard<Mem>>| false).unwrap();
        w.set(2, "b".into()).unwrap();
        assert_eq!(w.flush().unwrap(), 1);
        assert_eq!(w.describe(), "WriteCached<MemoryStore>");
    }
}
