//! Directory-style views over flat path-keyed stores.
//!
//! [`NestedPaths`] shows the immediate children of a prefix. A child that
//! has keys below it is listed as a directory, with the separator appended
//! (`"docs/"`); any other child is a leaf (`"readme.md"`). When a store holds
//! both `foo` and `foo/bar`, both `"foo"` and `"foo/"` are listed: the
//! trailing separator is what tells a directory from a file, everywhere in
//! this module.
//!
//! Inner keys with an empty segment below the view's prefix, such as
//! directory markers (`"foo/"`) or doubled separators (`"a//b"`), have no
//! name in the view. They are neither listed nor reachable.
//!
//! Sub-stores share the inner store through an `Arc` and know only their own
//! prefix. They hold no reference to the parent view.

use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::paths::path_get::Descend;
use crate::traits::{describe_wrapper, Collection, Describe, KeyIter, Persister, Reader};

/// Default path separator.
pub const SEPARATOR: &str = "/";

/// A value read from a [`NestedPaths`] view.
pub enum Node<S: Reader> {
    Leaf(S::Value),
    Dir(NestedPaths<S>),
}

impl<S: Reader> Node<S> {
    pub fn into_leaf(self) -> Option<S::Value> {
        match self {
            Node::Leaf(v) => Some(v),
            Node::Dir(_) => None,
        }
    }

    pub fn into_dir(self) -> Option<NestedPaths<S>> {
        match self {
            Node::Leaf(_) => None,
            Node::Dir(d) => Some(d),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Dir(_))
    }
}

impl<S> Debug for Node<S>
where
    S: Reader,
    S::Value: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Leaf(v) => f.debug_tuple("Leaf").field(v).finish(),
            Node::Dir(d) => f.debug_tuple("Dir").field(&d.prefix).finish(),
        }
    }
}

/// The children of one prefix of a path-keyed store.
pub struct NestedPaths<S> {
    store: Arc<S>,
    prefix: String,
    sep: String,
}

impl<S> NestedPaths<S> {
    /// View the root of `store`, with `/` as separator.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_separator(store, SEPARATOR)
    }

    pub fn with_separator(store: Arc<S>, sep: impl Into<String>) -> Self {
        Self {
            store,
            prefix: String::new(),
            sep: sep.into(),
        }
    }

    /// The inner-store prefix of this view; empty at the root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.store
    }

    fn is_dir_key(&self, key: &str) -> bool {
        key.ends_with(&self.sep)
    }

    fn child(&self, dir_key: &str) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: format!("{}{dir_key}", self.prefix),
            sep: self.sep.clone(),
        }
    }

    /// Immediate-child name of a path relative to this view.
    fn child_name<'a>(&self, rest: &'a str) -> &'a str {
        match rest.find(self.sep.as_str()) {
            Some(at) => &rest[..at + self.sep.len()],
            None => rest,
        }
    }

    /// Reject keys that would reach below the immediate children.
    fn check_key(&self, key: &str) -> StoreResult<()> {
        let body = key.strip_suffix(self.sep.as_str()).unwrap_or(key);
        if body.is_empty() || body.contains(self.sep.as_str()) {
            return Err(StoreError::key_not_valid(
                &key,
                format!("not an immediate child name (separator {:?})", self.sep),
            ));
        }
        Ok(())
    }
}

impl<S: Collection<Key = String>> NestedPaths<S> {
    /// Inner keys below `prefix`, paired with their path relative to it.
    /// Paths with an empty segment are skipped.
    fn keys_below<'a>(&'a self, prefix: &'a str) -> StoreResult<KeyIter<'a, (String, String)>> {
        let ids = self.store.iter_keys()?;
        let sep = self.sep.as_str();
        Ok(Box::new(ids.filter_map(move |id| match id {
            Ok(id) => {
                let rel = id.strip_prefix(prefix)?;
                if rel.split(sep).any(str::is_empty) {
                    return None;
                }
                let rel = rel.to_string();
                Some(Ok((id, rel)))
            }
            Err(e) => Some(Err(e)),
        })))
    }

    fn has_keys_below(&self, prefix: &str) -> StoreResult<bool> {
        match self.keys_below(prefix)?.next() {
            Some(first) => first.map(|_| true),
            None => Ok(false),
        }
    }

    /// Every leaf at any depth below this view, as `(relative path, id)`.
    pub fn leaf_paths(&self) -> StoreResult<Vec<(String, String)>> {
        self.keys_below(&self.prefix)?
            .map(|r| r.map(|(id, rel)| (rel, id)))
            .collect()
    }
}

impl<S: Collection<Key = String>> Collection for NestedPaths<S> {
    type Key = String;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, String>> {
        let mut seen = HashSet::new();
        let below = self.keys_below(&self.prefix)?;
        Ok(Box::new(below.filter_map(move |entry| match entry {
            Ok((_, rel)) => {
                let name = self.child_name(&rel).to_string();
                seen.insert(name.clone()).then_some(Ok(name))
            }
            Err(e) => Some(Err(e)),
        })))
    }

    fn contains(&self, key: &String) -> StoreResult<bool> {
        if self.check_key(key).is_err() {
            return Ok(false);
        }
        let full = format!("{}{key}", self.prefix);
        if self.is_dir_key(key) {
            self.has_keys_below(&full)
        } else {
            self.store.contains(&full)
        }
    }
}

impl<S: Reader<Key = String>> Reader for NestedPaths<S> {
    type Value = Node<S>;

    fn get(&self, key: &String) -> StoreResult<Node<S>> {
        self.check_key(key)?;
        let full = format!("{}{key}", self.prefix);
        if self.is_dir_key(key) {
            if self.has_keys_below(&full)? {
                Ok(Node::Dir(self.child(key)))
            } else {
                Err(StoreError::key_not_found(key))
            }
        } else {
            self.store.get(&full).map(Node::Leaf)
        }
    }
}

impl<S: Persister<Key = String>> Persister for NestedPaths<S> {
    /// Writing a directory copies every leaf of it below `key`.
    fn set(&self, key: String, value: Node<S>) -> StoreResult<()> {
        self.check_key(&key)?;
        let full = format!("{}{key}", self.prefix);
        match value {
            Node::Leaf(v) if !self.is_dir_key(&key) => self.store.set(full, v),
            Node::Dir(src) if self.is_dir_key(&key) => {
                for (rel, id) in src.leaf_paths()? {
                    let v = src.store.get(&id)?;
                    self.store.set(format!("{full}{rel}"), v)?;
                }
                Ok(())
            }
            Node::Leaf(_) => Err(StoreError::key_not_valid(&key, "leaf written under a directory key")),
            Node::Dir(_) => Err(StoreError::key_not_valid(&key, "directory written under a leaf key")),
        }
    }

    /// Deleting a directory deletes every leaf below it.
    fn delete(&self, key: &String) -> StoreResult<()> {
        self.check_key(key)?;
        let full = format!("{}{key}", self.prefix);
        if !self.is_dir_key(key) {
            return self.store.delete(&full);
        }
        let ids: Vec<String> = self
            .keys_below(&full)?
            .map(|r| r.map(|(id, _)| id))
            .collect::<StoreResult<_>>()?;
        if ids.is_empty() {
            return Err(StoreError::key_not_found(key));
        }
        for id in &ids {
            self.store.delete(id)?;
        }
        Ok(())
    }
}

/// Descending into a directory tries the leaf `key` first, then the
/// directory `key/`.
impl<S: Reader<Key = String>> Descend<String> for Node<S> {
    fn descend(&self, key: &String) -> StoreResult<Self> {
        match self {
            Node::Leaf(_) => Err(StoreError::key_not_valid(key, "cannot descend into a leaf")),
            Node::Dir(dir) => {
                if dir.contains(key)? {
                    return dir.get(key);
                }
                let as_dir = format!("{key}{}", dir.sep);
                match dir.get(&as_dir) {
                    Err(e) if e.is_key_not_found() => Err(StoreError::key_not_found(key)),
                    other => other,
                }
            }
        }
    }
}

impl<S: Describe> Describe for NestedPaths<S> {
    fn layer_name(&self) -> &'static str {
        "NestedPaths"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &*self.store)
    }
}

impl<S> Debug for NestedPaths<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedPaths")
            .field("prefix", &self.prefix)
            .field("sep", &self.sep)
            .finish()
    }
}
