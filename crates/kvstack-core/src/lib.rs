//! Key-value store contract and composable store transformations.
//!
//! Every storage backend, whether memory, files or something remote, is
//! exposed through the same small set of capability traits, and behavior
//! is added by wrapping one store in another.
//!
//! # Contract
//!
//! - [`Collection`] -- key enumeration, membership, size
//! - [`Reader`] -- keyed reads
//! - [`Persister`] -- writes and deletes
//! - [`Store`] -- all of the above; bulk `clear` is always refused
//!
//! # Layers
//!
//! - [`Wrap`] -- key and value translation through [`Hooks`]
//! - [`RelativePaths`], [`NestedPaths`], [`AddPathGet`] -- path views
//! - [`Guard`], [`ReadOnly`], [`NoOverwrite`] -- operation restrictions
//! - [`FilterKeys`], [`Aliased`], [`CachedKeys`] -- key collection views
//! - [`ReadCached`], [`WriteCached`], [`Aggregator`] -- caching and batching
//! - [`Appendable`] -- `append` through an item-to-kv function
//!
//! Layers are applied either directly on a store with [`StoreExt`] or as
//! reusable [`Transform`] values that can be chained and applied to many
//! stores.
//!
//! # Rules
//!
//! 1. A wrapper never holds data of its own beyond caches it documents.
//! 2. Errors keep their kind across layers: a missing key is
//!    [`StoreError::KeyNotFound`] however deep it was raised.
//! 3. Stores are never bulk-cleared through the contract; use [`Purge`].

pub mod aliases;
pub mod append;
pub mod cached_keys;
pub mod caching;
pub mod codec;
pub mod error;
pub mod filter;
pub mod guards;
pub mod hooks;
pub mod memory;
pub mod paths;
pub mod traits;
pub mod transform;
pub mod wrap;

// Re-export primary types at crate root for ergonomic imports.
pub use aliases::{AliasLayer, Aliased};
pub use append::{item_to_kv, Appendable, ItemToKv};
pub use cached_keys::{CachedKeys, CachedKeysLayer, KeyContainer};
pub use caching::{Aggregator, ReadCached, WithPurge, WriteCached};
pub use error::{Operation, StoreError, StoreResult};
pub use filter::{FilterKeys, FilterLayer};
pub use guards::{Forbidden, Guard, NoOverwrite, NoOverwriteLayer, ReadOnly, ReadOnlyLayer};
pub use hooks::{Hooks, KeyMap, ValueMap};
pub use memory::MemoryStore;
pub use paths::{
    AddPathGet, Descend, JsonStore, KeyPath, NestedPaths, Node, PathGetLayer, PathTemplate,
    RelativeLayer, RelativePaths, TemplateError,
};
pub use traits::{Collection, Describe, KeyCompletions, Persister, Purge, Reader, Store};
pub use transform::{Chain, StoreExt, Transform};
pub use wrap::Wrap;
