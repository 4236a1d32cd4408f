//! Memoizing TTL cache
//!
//! Callers wrap expensive upstream calls with [`TtlCache::wrap`], usually
//! around a `RetryExecutor::run`. Values are cloned on the way in and on the
//! way out so no caller can mutate what another caller reads.

use crate::cleanup::{self, CleanupHandle};
use backstop_core::application::ShutdownToken;
use backstop_core::port::TimeProvider;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// TTL applied when the caller gives none (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry<V> {
    value: V,
    expires_at: i64, // epoch ms
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    time_provider: Arc<dyn TimeProvider>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self::with_default_ttl(time_provider, DEFAULT_TTL)
    }

    pub fn with_default_ttl(time_provider: Arc<dyn TimeProvider>, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            time_provider,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result.
    ///
    /// Errors from `fetch` are passed through and never cached. Concurrent
    /// misses on the same key may each call `fetch`; the last write wins.
    pub async fn wrap<F, Fut, E>(&self, key: &str, fetch: F, ttl: Option<Duration>) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Cache hit");
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Cache miss, fetching");

        let value = fetch().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Fresh value for `key`, if any
    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key)
    }

    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let ttl_ms = ttl.unwrap_or(self.default_ttl).as_millis().min(i64::MAX as u128) as i64;
        let expires_at = self.time_provider.now_millis().saturating_add(ttl_ms);
        self.entries
            .lock()
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    /// Remove one key; returns whether it was present
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.time_provider.now_millis();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Entries currently stored (expired ones included until purged)
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Start the periodic purge task. The caller owns the handle and must
    /// stop it (or signal `shutdown`) when tearing down.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration, shutdown: ShutdownToken) -> CleanupHandle {
        let cache = Arc::clone(self);
        cleanup::spawn(interval, shutdown, move || cache.purge_expired())
    }

    fn lookup(&self, key: &str) -> Option<V> {
        let now = self.time_provider.now_millis();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}
