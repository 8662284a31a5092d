//! Guard layers that refuse operations before they reach the inner store.
//!
//! - [`Guard`] -- switch off any combination of reads, writes, deletes and
//!   iteration on a store that supports them
//! - [`ReadOnly`] -- expose a write surface over any reader that always
//!   refuses, so read-only stacks fail with a typed error instead of not
//!   compiling at the call site
//! - [`NoOverwrite`] -- refuse `set` on keys that already exist

use std::fmt::{self, Debug};

use crate::error::{Operation, StoreError, StoreResult};
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};
use crate::transform::Transform;

/// Which operations a [`Guard`] refuses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Forbidden {
    pub reads: bool,
    pub writes: bool,
    pub deletes: bool,
    pub iteration: bool,
}

impl Forbidden {
    pub const NONE: Self = Self {
        reads: false,
        writes: false,
        deletes: false,
        iteration: false,
    };
    pub const READS: Self = Self {
        reads: true,
        ..Self::NONE
    };
    pub const WRITES: Self = Self {
        writes: true,
        ..Self::NONE
    };
    pub const DELETES: Self = Self {
        deletes: true,
        ..Self::NONE
    };
    pub const ITERATION: Self = Self {
        iteration: true,
        ..Self::NONE
    };
    /// Writes and deletes.
    pub const MUTATIONS: Self = Self {
        writes: true,
        deletes: true,
        ..Self::NONE
    };

    pub const fn union(self, other: Self) -> Self {
        Self {
            reads: self.reads || other.reads,
            writes: self.writes || other.writes,
            deletes: self.deletes || other.deletes,
            iteration: self.iteration || other.iteration,
        }
    }

    pub const fn forbids(&self, op: Operation) -> bool {
        match op {
            Operation::Read => self.reads,
            Operation::Write => self.writes,
            Operation::Delete => self.deletes,
            Operation::Iterate => self.iteration,
            Operation::Clear => true,
        }
    }
}

/// A store with some operations switched off.
///
/// Refused calls fail with `OperationForbidden` and never touch the inner
/// store. `contains` stays available unless reads are forbidden.
pub struct Guard<S> {
    store: S,
    forbidden: Forbidden,
}

impl<S> Guard<S> {
    pub fn new(store: S, forbidden: Forbidden) -> Self {
        Self { store, forbidden }
    }

    pub fn forbidden(&self) -> Forbidden {
        self.forbidden
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn check(&self, op: Operation, key: &impl Debug) -> StoreResult<()> {
        if self.forbidden.forbids(op) {
            return Err(StoreError::forbidden(op, key));
        }
        Ok(())
    }

    fn check_iteration(&self) -> StoreResult<()> {
        if self.forbidden.iteration {
            return Err(StoreError::forbidden_op(Operation::Iterate));
        }
        Ok(())
    }
}

impl<S: Collection> Collection for Guard<S> {
    type Key = S::Key;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, S::Key>> {
        self.check_iteration()?;
        self.store.iter_keys()
    }

    fn contains(&self, key: &S::Key) -> StoreResult<bool> {
        self.check(Operation::Read, key)?;
        self.store.contains(key)
    }

    fn len(&self) -> StoreResult<usize> {
        self.check_iteration()?;
        self.store.len()
    }
}

impl<S: Reader> Reader for Guard<S> {
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        self.check(Operation::Read, key)?;
        self.store.get(key)
    }
}

impl<S: Persister> Persister for Guard<S> {
    fn set(&self, key: S::Key, value: S::Value) -> StoreResult<()> {
        self.check(Operation::Write, &key)?;
        self.store.set(key, value)
    }

    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        self.check(Operation::Delete, key)?;
        self.store.delete(key)
    }
}

impl<S: Describe> Describe for Guard<S> {
    fn layer_name(&self) -> &'static str {
        "Guard"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Debug> Debug for Guard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("store", &self.store)
            .field("forbidden", &self.forbidden)
            .finish()
    }
}

impl<S: Collection> Transform<S> for Forbidden {
    type Output = Guard<S>;

    fn apply(&self, store: S) -> Guard<S> {
        Guard::new(store, *self)
    }
}

/// A read-only view of any reader.
#[derive(Debug)]
pub struct ReadOnly<S> {
    store: S,
}

impl<S> ReadOnly<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }
}

impl<S: Collection> Collection for ReadOnly<S> {
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

impl<S: Reader> Reader for ReadOnly<S> {
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        self.store.get(key)
    }
}

impl<S: Reader> Persister for ReadOnly<S> {
    fn set(&self, key: S::Key, _value: S::Value) -> StoreResult<()> {
        Err(StoreError::forbidden(Operation::Write, &key))
    }

    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        Err(StoreError::forbidden(Operation::Delete, key))
    }
}

impl<S: Describe> Describe for ReadOnly<S> {
    fn layer_name(&self) -> &'static str {
        "ReadOnly"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

/// Reusable read-only transformation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadOnlyLayer;

impl<S: Reader> Transform<S> for ReadOnlyLayer {
    type Output = ReadOnly<S>;

    fn apply(&self, store: S) -> ReadOnly<S> {
        ReadOnly::new(store)
    }
}

/// A store on which existing keys cannot be written again.
///
/// Deleting a key makes it writable again.
#[derive(Debug)]
pub struct NoOverwrite<S> {
    store: S,
}

impl<S> NoOverwrite<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }
}

impl<S: Collection> Collection for NoOverwrite<S> {
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

impl<S: Reader> Reader for NoOverwrite<S> {
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        self.store.get(key)
    }
}

impl<S: Persister> Persister for NoOverwrite<S> {
    fn set(&self, key: S::Key, value: S::Value) -> StoreResult<()> {
        if self.store.contains(&key)? {
            return Err(StoreError::overwrite_forbidden(&key));
        }
        self.store.set(key, value)
    }

    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        self.store.delete(key)
    }
}

impl<S: Describe> Describe for NoOverwrite<S> {
    fn layer_name(&self) -> &'static str {
        "NoOverwrite"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

/// Reusable no-overwrite transformation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOverwriteLayer;

impl<S: Persister> Transform<S> for NoOverwriteLayer {
    type Output = NoOverwrite<S>;

    fn apply(&self, store: S) -> NoOverwrite<S> {
        NoOverwrite::new(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn kv() -> MemoryStore<&'static str, &'static str> {
        MemoryStore::from_iter([("a", "1"), ("b", "2")])
    }

    // -----------------------------------------------------------------------
    // Guard
    // -----------------------------------------------------------------------

    #[test]
    fn disabled_writes_do_not_reach_inner() {
        let g = Guard::new(kv(), Forbidden::WRITES);
        let err = g.set("c", "3").unwrap_err();
        assert!(err.is_forbidden(Operation::Write));
        assert!(!g.inner().contains(&"c").unwrap());

        // Deletes are still allowed.
        g.delete(&"a").unwrap();
        assert_eq!(g.keys().unwrap(), vec!["b"]);
    }

    #[test]
    fn disabled_deletes() {
        let g = Guard::new(kv(), Forbidden::DELETES);
        assert!(g.delete(&"a").unwrap_err().is_forbidden(Operation::Delete));
        assert!(g.inner().contains(&"a").unwrap());
        g.set("c", "3").unwrap();
    }

    #[test]
    fn disabled_iteration() {
        let g = Guard::new(kv(), Forbidden::ITERATION);
        assert!(g.iter_keys().is_err());
        assert!(g.len().unwrap_err().is_forbidden(Operation::Iterate));
        // Point lookups still work.
        assert_eq!(g.get(&"a").unwrap(), "1");
        assert!(g.contains(&"a").unwrap());
    }

    #[test]
    fn disabled_reads() {
        let g = Guard::new(kv(), Forbidden::READS);
        assert!(g.get(&"a").unwrap_err().is_forbidden(Operation::Read));
        assert!(g.contains(&"a").is_err());
        assert_eq!(g.len().unwrap(), 2);
    }

    #[test]
    fn union_combines_flags() {
        let f = Forbidden::WRITES.union(Forbidden::DELETES);
        assert_eq!(f, Forbidden::MUTATIONS);
        assert!(f.forbids(Operation::Clear));
        assert!(!f.forbids(Operation::Read));
    }

    #[test]
    fn forbidden_message_carries_key() {
        let g = Guard::new(kv(), Forbidden::WRITES);
        let msg = g.set("zz", "v").unwrap_err().to_string();
        assert!(msg.contains("\"zz\""));
    }

    // -----------------------------------------------------------------------
    // ReadOnly
    // -----------------------------------------------------------------------

    /// A reader with no write capability at all.
    struct Fixed;

    impl Collection for Fixed {
        type Key = u8;

        fn iter_keys(&self) -> StoreResult<KeyIter<'_, u8>> {
            Ok(Box::new([1u8, 2].into_iter().map(Ok)))
        }
    }

    impl Reader for Fixed {
        type Value = u8;

        fn get(&self, key: &u8) -> StoreResult<u8> {
            if *key == 1 || *key == 2 {
                Ok(key * 10)
            } else {
                Err(StoreError::key_not_found(key))
            }
        }
    }

    #[test]
    fn read_only_over_plain_reader_raises_typed_errors() {
        let ro = ReadOnly::new(Fixed);
        assert_eq!(ro.get(&2).unwrap(), 20);
        assert!(ro.set(3, 30).unwrap_err().is_forbidden(Operation::Write));
        assert!(ro.delete(&1).unwrap_err().is_forbidden(Operation::Delete));
    }

    #[test]
    fn read_only_layer_is_reusable() {
        let layer = ReadOnlyLayer;
        let a = layer.apply(kv());
        let b = layer.apply(kv());
        assert!(a.set("x", "y").is_err());
        assert_eq!(b.len().unwrap(), 2);
        assert_eq!(a.describe(), "ReadOnly<MemoryStore>");
    }

    // -----------------------------------------------------------------------
    // NoOverwrite
    // -----------------------------------------------------------------------

    #[test]
    fn second_write_is_refused_and_first_value_kept() {
        let w = NoOverwrite::new(MemoryStore::new());
        w.set("k", "v1").unwrap();
        let err = w.set("k", "v2").unwrap_err();
        assert!(matches!(err, StoreError::OverwriteForbidden { .. }));
        assert_eq!(w.get(&"k").unwrap(), "v1");
    }

    #[test]
    fn delete_reopens_key() {
        let w = NoOverwriteLayer.apply(MemoryStore::new());
        w.set("k", 1).unwrap();
        w.delete(&"k").unwrap();
        w.set("k", 2).unwrap();
        assert_eq!(w.get(&"k").unwrap(), 2);
    }
}
