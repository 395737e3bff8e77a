//! Result caching with single-flight computation
//!
//! Finished results are kept in a pluggable [`CacheStore`] (in-memory LRU
//! with TTL by default). Concurrent identical requests that miss share one
//! computation: the first caller spawns it, later callers subscribe to its
//! result. The computation outlives any individual caller and is aborted
//! only once every caller has gone away.
//!
//! Backend failures never fail a request. A failed read is a miss, a failed
//! write is dropped; both are logged and counted.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{HybrankError, Result};
use crate::search::query::Query;
use crate::search::result::SearchResult;

/// Key for cache entries: SHA-256 over every query field that can change
/// the result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key from a validated query whose rerank decision is final.
    pub fn for_query(query: &Query) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(query.normalized_text.as_bytes());
        hasher.update([0u8]);
        hasher.update(query.mode.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update((query.topk as u64).to_le_bytes());
        hasher.update([u8::from(query.rerank_requested)]);
        hasher.update(query.strategy.as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Full hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading digest characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

/// Stored result with its lifetime bounds.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Arc<SearchResult>,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn new(value: Arc<SearchResult>, ttl: Duration) -> Self {
        let created_at = Instant::now();
        Self {
            value,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Storage backend for finished results.
///
/// The store only holds entries; expiry decisions are made by
/// [`ResultCache`] except in [`CacheStore::purge_expired`].
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()>;

    /// Returns whether an entry was removed.
    fn remove(&self, key: &CacheKey) -> Result<bool>;

    fn clear(&self) -> Result<()>;

    /// Drop every entry expired at `now`; returns how many were dropped.
    fn purge_expired(&self, now: Instant) -> Result<usize>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries pushed out by the capacity bound so far.
    fn evictions(&self) -> u64 {
        0
    }
}

/// In-memory LRU store
pub struct MemoryStore {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    evictions: AtomicU64,
}

impl MemoryStore {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("len", &self.len())
            .field("evictions", &self.evictions.load(Ordering::Relaxed))
            .finish()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        let displaced = self.entries.lock().push(key.clone(), entry);
        if let Some((old_key, _)) = displaced {
            if old_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.lock().pop(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn purge_expired(&self, now: Instant) -> Result<usize> {
        let mut entries = self.entries.lock();
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        Ok(expired.len())
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

/// Cache counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    /// Lookups that found no usable entry, coalesced waits included
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
    /// Computations currently running
    pub in_flight: usize,
    /// Requests that joined a computation started by another request
    pub coalesced: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub backend_errors: u64,
}

type FlightValue = Option<Result<Arc<SearchResult>>>;

/// One running computation and the callers waiting on it.
struct Flight {
    id: u64,
    rx: watch::Receiver<FlightValue>,
    waiters: AtomicUsize,
    abort: AbortHandle,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    expirations: AtomicU64,
    backend_errors: AtomicU64,
}

struct CacheInner {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    in_flight: Mutex<HashMap<CacheKey, Arc<Flight>>>,
    next_flight: AtomicU64,
    counters: Counters,
}

impl CacheInner {
    /// Store lookup with expiry and failure handling; `None` is a miss.
    fn lookup(&self, key: &CacheKey) -> Option<Arc<SearchResult>> {
        match self.store.get(key) {
            Ok(Some(entry)) if !entry.is_expired(Instant::now()) => Some(entry.value),
            Ok(Some(_)) => {
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                if let Err(err) = self.store.remove(key) {
                    self.backend_failure("remove", &err);
                }
                None
            }
            Ok(None) => None,
            Err(err) => {
                self.backend_failure("read", &err);
                None
            }
        }
    }

    fn save(&self, key: &CacheKey, value: Arc<SearchResult>) {
        if let Err(err) = self.store.put(key.clone(), CacheEntry::new(value, self.ttl)) {
            self.backend_failure("write", &err);
        }
    }

    fn backend_failure(&self, op: &str, err: &HybrankError) {
        self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
        warn!(op, error = %err, "Cache backend failure ignored");
    }

    /// Remove the flight for `key` if it is still flight `id`.
    fn finish_flight(&self, key: &CacheKey, id: u64) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.get(key).is_some_and(|f| f.id == id) {
            in_flight.remove(key);
        }
    }
}

/// Releases a caller's interest in a flight; the last one out aborts an
/// unfinished computation.
struct WaiterGuard {
    inner: Arc<CacheInner>,
    key: CacheKey,
    flight: Arc<Flight>,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        let mut in_flight = self.inner.in_flight.lock();
        let remaining = self.flight.waiters.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 && self.flight.rx.borrow().is_none() {
            self.flight.abort.abort();
            if in_flight.get(&self.key).is_some_and(|f| f.id == self.flight.id) {
                in_flight.remove(&self.key);
            }
            debug!(key = self.key.short(), "Abandoned computation aborted");
        }
    }
}

/// TTL/LRU result cache with single-flight computation.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.inner.ttl)
            .field("entries", &self.inner.store.len())
            .field("in_flight", &self.inner.in_flight.lock().len())
            .finish()
    }
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                ttl,
                in_flight: Mutex::new(HashMap::new()),
                next_flight: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    /// In-memory cache sized and timed from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            Arc::new(MemoryStore::new(config.max_entries)),
            Duration::from_secs(config.ttl_seconds),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Return the cached result for `key`, or run `compute` exactly once
    /// across all concurrent callers for that key.
    ///
    /// The boolean is `true` when the result came from the store. Errors are
    /// delivered to every waiter and never cached. Must be called from
    /// within a tokio runtime.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<(Arc<SearchResult>, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SearchResult>> + Send + 'static,
    {
        let inner = &self.inner;
        if let Some(hit) = inner.lookup(&key) {
            inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((hit, true));
        }

        let flight = {
            let mut in_flight = inner.in_flight.lock();
            if let Some(existing) = in_flight.get(&key) {
                existing.waiters.fetch_add(1, Ordering::AcqRel);
                inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = key.short(), "Joined in-flight computation");
                Arc::clone(existing)
            } else if let Some(hit) = inner.lookup(&key) {
                // A flight finished between the first lookup and taking the lock.
                inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok((hit, true));
            } else {
                inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                let flight = self.start_flight(key.clone(), compute());
                in_flight.insert(key.clone(), Arc::clone(&flight));
                flight
            }
        };

        let guard = WaiterGuard {
            inner: Arc::clone(inner),
            key,
            flight,
        };
        let mut rx = guard.flight.rx.clone();
        let value = match rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        drop(guard);

        match value {
            Some(Ok(result)) => Ok((result, false)),
            Some(Err(err)) => Err(err),
            None => Err(HybrankError::Internal(
                "cached computation ended without a result".to_string(),
            )),
        }
    }

    /// Spawn the computation. Called with the in-flight lock held, so the
    /// task cannot retire its flight before it is registered.
    fn start_flight<Fut>(&self, key: CacheKey, fut: Fut) -> Arc<Flight>
    where
        Fut: Future<Output = Result<SearchResult>> + Send + 'static,
    {
        let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        let inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            let outcome = fut.await.map(Arc::new);
            if let Ok(result) = &outcome {
                // Stored before the flight retires so no caller can miss both.
                inner.save(&key, Arc::clone(result));
            }
            inner.finish_flight(&key, id);
            let _ = tx.send(Some(outcome));
        });

        Arc::new(Flight {
            id,
            rx,
            waiters: AtomicUsize::new(1),
            abort: handle.abort_handle(),
        })
    }

    /// Drop one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        match self.inner.store.remove(key) {
            Ok(removed) => removed,
            Err(err) => {
                self.inner.backend_failure("remove", &err);
                false
            }
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.inner.store.clear() {
            self.inner.backend_failure("clear", &err);
        }
    }

    /// Drop every expired entry now.
    pub fn purge_expired(&self) -> usize {
        match self.inner.store.purge_expired(Instant::now()) {
            Ok(purged) => {
                self.inner
                    .counters
                    .expirations
                    .fetch_add(purged as u64, Ordering::Relaxed);
                purged
            }
            Err(err) => {
                self.inner.backend_failure("purge", &err);
                0
            }
        }
    }

    /// Periodically purge expired entries. The task ends on its own once
    /// every handle to this cache is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let purged = Self { inner }.purge_expired();
                if purged > 0 {
                    debug!(purged, "Cache sweep");
                }
            }
        })
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        let hits = counters.hits.load(Ordering::Relaxed);
        let misses = counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            entries: self.inner.store.len(),
            in_flight: self.inner.in_flight.lock().len(),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
            evictions: self.inner.store.evictions(),
            expirations: counters.expirations.load(Ordering::Relaxed),
            backend_errors: counters.backend_errors.load(Ordering::Relaxed),
        }
    }
}
