//! Value-keyed TTL cache

use super::CacheEntry;
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tracing::debug;

/// Cache whose keys compare by content.
///
/// Used for provider documents keyed by URI. The number of distinct keys is
/// expected to be small and fixed, so nothing is ever evicted except by
/// recomputation.
///
/// # Example
///
/// ```rust
/// use openid_bearer::cache::ValueCache;
/// use std::time::Duration;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let cache: ValueCache<String, u32> = ValueCache::new(Some(Duration::from_secs(900)));
///
/// let answer = cache
///     .get_or_try_insert_with(&"https://idp.example".to_string(), || async {
///         Ok::<_, std::io::Error>(42)
///     })
///     .await?;
/// assert_eq!(answer, 42);
/// # Ok::<(), std::io::Error>(())
/// # }).unwrap();
/// ```
pub struct ValueCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    timeout: Option<Duration>,
}

impl<K, V> ValueCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache; `None` means entries never expire
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            timeout,
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
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(payload) = self.get(key) {
            return Ok(payload);
        }

        let payload = compute().await?;
        self.entries.insert(key.clone(), CacheEntry::new(payload.clone()));
        Ok(payload)
    }

    /// Synchronous, infallible variant of
    /// [`get_or_try_insert_with`](Self::get_or_try_insert_with)
    pub fn get_or_insert_with<F>(&self, key: &K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(payload) = self.get(key) {
            return payload;
        }

        let payload = compute();
        self.entries.insert(key.clone(), CacheEntry::new(payload.clone()));
        payload
    }

    /// Fresh payload for `key`, if any
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.is_fresh(self.timeout) {
            return Some(entry.payload.clone());
        }
        debug!(
            age_ms = entry.fetched_at.elapsed().as_millis() as u64,
            "Cache entry expired"
        );
        None
    }

    /// Drop the entry for `key`
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, V> fmt::Debug for ValueCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCache")
            .field("entries", &self.entries.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
