//! Shared cache for generator output.
//!
//! Entries are keyed by [`CacheKey`]: the generator's identity (rendered
//! script or producer id) plus an invalidation scope chosen by its strategy
//! (empty, working directory, or repository fingerprint). Every entry also
//! expires after its TTL.
//!
//! Reads take a shared lock and never wait on executions. Misses on the same
//! key are collapsed: the first caller computes while later callers wait on a
//! per-key mutex and then read what it stored.

use crate::Result;
use crate::types::Suggestion;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Cache key: what ran, and in which state of the world.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Generator identity
    pub identity: String,
    /// Invalidation scope
    pub scope: String,
}

impl CacheKey {
    /// Build a key.
    pub fn new(identity: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            scope: scope.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    suggestions: Arc<Vec<Suggestion>>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Counters reported by `cliflow daemon status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to compute
    pub misses: u64,
    /// Computations that failed and were not stored
    pub failures: u64,
    /// Entries currently held
    pub entries: usize,
}

/// Generator output cache shared by every connection of the daemon.
#[derive(Debug, Default)]
pub struct GeneratorCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    in_flight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
}

impl GeneratorCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh entry for `key`, if any.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Suggestion>>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.is_fresh(Instant::now()))
            .map(|e| Arc::clone(&e.suggestions))
    }

    /// Store `suggestions` under `key` for `ttl`, sweeping expired entries.
    pub async fn insert(&self, key: CacheKey, suggestions: Vec<Suggestion>, ttl: Duration) {
        self.insert_shared(key, Arc::new(suggestions), ttl).await;
    }

    /// Return the cached list for `key`, or run `compute` once and cache it.
    ///
    /// Concurrent callers with the same key share one `compute`. A failed
    /// computation is logged, not stored, and yields an empty list.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Arc<Vec<Suggestion>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Suggestion>>>,
    {
        if let Some(hit) = self.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(identity = %key.identity, "generator cache hit");
            return hit;
        }

        let slot = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };

        let result = {
            let _guard = slot.lock().await;

            if let Some(hit) = self.get(&key).await {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(identity = %key.identity, "generator computed by another task");
                hit
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(identity = %key.identity, "generator cache miss");
                match compute().await {
                    Ok(suggestions) => {
                        let shared = Arc::new(suggestions);
                        self.insert_shared(key.clone(), Arc::clone(&shared), ttl)
                            .await;
                        shared
                    },
                    Err(e) => {
                        self.failures.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            identity = %key.identity,
                            category = e.category(),
                            error = %e,
                            "generator failed, not cached"
                        );
                        Arc::new(Vec::new())
                    },
                }
            }
        };

        drop(slot);
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(&key).is_some_and(|s| Arc::strong_count(s) == 1) {
            in_flight.remove(&key);
        }

        result
    }

    async fn insert_shared(&self, key: CacheKey, suggestions: Arc<Vec<Suggestion>>, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.is_fresh(now));
        entries.insert(
            key,
            CacheEntry {
                suggestions,
                expires_at: now + ttl,
            },
        );
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of entries, fresh or not yet swept.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Snapshot of the counters.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            entries: self.len().await,
        }
    }
}
