//! # Keyed TTL caches
//!
//! Two lazily refreshed, concurrency-safe memoization stores:
//!
//! - [`ValueCache`] keys entries by value (a URI string, typically). Entries
//!   live until their timeout forces recomputation.
//! - [`IdentityCache`] keys entries by the identity of an `Arc` (a request
//!   object, typically). Entries never keep their key alive and are swept
//!   once the key is dropped, so memory does not grow with the number of
//!   requests served.
//!
//! Each cached operation owns its own cache instance, so two operations that
//! happen to use the same literal key never share a slot.
//!
//! ## Freshness
//!
//! An entry is served while `now - fetched_at <= timeout`. A timeout of
//! `None` means entries never expire. Time is read from
//! [`tokio::time::Instant`], which tests can pause and advance.
//!
//! ## Concurrency
//!
//! Both stores sit on [`dashmap::DashMap`]. No shard lock is held while the
//! `compute` future runs; two callers missing on the same key at the same time
//! may both compute, and the last one to finish wins the slot. A reader racing
//! with a replacement clones out either the old or the new entry, never a
//! partial one. Failed computations cache nothing.

mod identity;
mod value;

pub use identity::IdentityCache;
pub use value::ValueCache;

use std::time::Duration;
use tokio::time::Instant;

/// One memoized payload with the time it was computed.
///
/// Entries are replaced wholesale on refresh, never mutated in place.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    payload: V,
    fetched_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(payload: V) -> Self {
        Self {
            payload,
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, timeout: Option<Duration>) -> bool {
        timeout.is_none_or(|ttl| self.fetched_at.elapsed() <= ttl)
    }
}
