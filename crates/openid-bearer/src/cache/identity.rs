//! Identity-keyed TTL cache with weak keys

use super::CacheEntry;
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

/// Entry count below which inserts never sweep
const MIN_SWEEP_LEN: usize = 64;

struct IdentityEntry<K: ?Sized, V> {
    owner: Weak<K>,
    entry: CacheEntry<V>,
}

/// Cache whose keys compare by `Arc` identity.
///
/// Two distinct `Arc`s never share an entry, however equal their contents.
/// Each entry holds only a [`Weak`] reference to its key; entries whose key
/// has been dropped are swept by an insert once the map has grown past a
/// threshold (twice its size after the previous sweep), or by
/// [`purge`](Self::purge), and are never served in the meantime. While an entry exists its weak
/// reference pins the key's allocation, so the address used for lookup
/// cannot be reused by another live `Arc`.
pub struct IdentityCache<K: ?Sized, V> {
    entries: DashMap<usize, IdentityEntry<K, V>>,
    timeout: Option<Duration>,
    sweep_at: AtomicUsize,
}

fn address<K: ?Sized>(key: &Arc<K>) -> usize {
    Arc::as_ptr(key).cast::<()>() as usize
}

impl<K: ?Sized, V: Clone> IdentityCache<K, V> {
    /// Create an empty cache; `None` means entries never expire
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            timeout,
            sweep_at: AtomicUsize::new(MIN_SWEEP_LEN),
        }
    }

    /// The configured timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Return the fresh payload for `key`, or run `compute` and store its
    /// result.
    ///
    /// # Errors
    ///
    /// Returns whatever `compute` returns on failure, unchanged. Nothing is
    /// cached in that case.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: &Arc<K>,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(payload) = self.get(key) {
            return Ok(payload);
        }

        let payload = compute().await?;
        self.insert(key, payload.clone());
        Ok(payload)
    }

    /// Synchronous, infallible variant of
    /// [`get_or_try_insert_with`](Self::get_or_try_insert_with)
    pub fn get_or_insert_with<F>(&self, key: &Arc<K>, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(payload) = self.get(key) {
            return payload;
        }

        let payload = compute();
        self.insert(key, payload.clone());
        payload
    }

    /// Fresh payload for `key`, if any
    pub fn get(&self, key: &Arc<K>) -> Option<V> {
        let slot = self.entries.get(&address(key))?;
        if slot.owner.strong_count() > 0 && slot.entry.is_fresh(self.timeout) {
            return Some(slot.entry.payload.clone());
        }
        None
    }

    fn insert(&self, key: &Arc<K>, payload: V) {
        if self.entries.len() >= self.sweep_at.load(Ordering::Relaxed) {
            self.purge();
            let next = (self.entries.len() * 2).max(MIN_SWEEP_LEN);
            self.sweep_at.store(next, Ordering::Relaxed);
        }
        self.entries.insert(
            address(key),
            IdentityEntry {
                owner: Arc::downgrade(key),
                entry: CacheEntry::new(payload),
            },
        );
    }

    /// Remove every entry whose key is no longer referenced.
    ///
    /// Returns the number of entries removed.
    pub fn purge(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.owner.strong_count() > 0);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            trace!(removed, "Swept entries for dropped keys");
        }
        removed
    }

    /// Drop the entry for `key`
    pub fn invalidate(&self, key: &Arc<K>) {
        self.entries.remove(&address(key));
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including not yet swept ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: ?Sized, V> fmt::Debug for IdentityCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCache")
            .field("entries", &self.entries.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
