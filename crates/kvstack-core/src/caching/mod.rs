//! Caching layers.
//!
//! - [`read::ReadCached`] -- read-through memoization, no invalidation
//! - [`write::WriteCached`] -- write-back batching with a flush predicate
//! - [`aggregate::Aggregator`] -- buffered append with batch conversion
//!
//! Any [`Persister`](crate::traits::Persister) can serve as the cache store.
//! Write-back caches also need [`Purge`](crate::traits::Purge);
//! [`write::WithPurge`] adds it to stores that lack it.

pub mod aggregate;
pub mod read;
pub mod write;

pub use aggregate::{buffer_len_at_least, Aggregator};
pub use read::ReadCached;
pub use write::{flush_manually, flush_when_len_at_least, WithPurge, WriteCached};
