//! Keyed TTL cache for idempotent read requests.
//!
//! A fresh hit is served without calling the fetcher; a miss or stale entry
//! calls it exactly once. A failed fetch keeps the previous value and records
//! the error next to it, so views can show stale data with an error marker.
//! Concurrent callers for the same key are not de-duplicated.

pub mod experts;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

pub use experts::ExpertDirectory;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
    pub fetched_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

/// What a read returns: last good data plus the state around it.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResult<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub stale: bool,
}

#[derive(Debug)]
struct Slot<T> {
    entry: Option<CacheEntry<T>>,
    error: Option<String>,
    in_flight: usize,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            entry: None,
            error: None,
            in_flight: 0,
        }
    }
}

#[derive(Debug)]
pub struct RequestCache<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T: Clone> RequestCache<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Serve from cache when younger than `ttl`, otherwise fetch.
    pub async fn get<F, Fut, E>(&self, key: &str, ttl: Duration, fetcher: F) -> CacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if let Some(hit) = self.fresh(key, ttl) {
            return hit;
        }
        self.fetch(key, ttl, fetcher).await
    }

    /// Fetch regardless of age.
    pub async fn refresh<F, Fut, E>(&self, key: &str, ttl: Duration, fetcher: F) -> CacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.fetch(key, ttl, fetcher).await
    }

    /// Re-fetch only when the entry is missing or stale (window regained focus).
    /// Returns `None` when nothing needed fetching.
    pub async fn revalidate_on_focus<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        fetcher: F,
    ) -> Option<CacheResult<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if self.fresh(key, ttl).is_some() {
            return None;
        }
        Some(self.fetch(key, ttl, fetcher).await)
    }

    /// Current state without fetching.
    pub fn peek(&self, key: &str, ttl: Duration) -> CacheResult<T> {
        let slots = self.slots.lock();
        match slots.get(key) {
            Some(slot) => Self::result_of(slot, ttl),
            None => CacheResult {
                data: None,
                is_loading: false,
                error: None,
                stale: true,
            },
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.slots.lock().remove(key);
    }

    pub fn invalidate_all(&self) {
        self.slots.lock().clear();
    }

    fn fresh(&self, key: &str, ttl: Duration) -> Option<CacheResult<T>> {
        let slots = self.slots.lock();
        let slot = slots.get(key)?;
        let entry = slot.entry.as_ref()?;
        if entry.is_stale(ttl) {
            return None;
        }
        Some(Self::result_of(slot, ttl))
    }

    async fn fetch<F, Fut, E>(&self, key: &str, ttl: Duration, fetcher: F) -> CacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.slots.lock().entry(key.to_string()).or_default().in_flight += 1;

        let outcome = fetcher().await;

        let mut slots = self.slots.lock();
        let slot = slots.entry(key.to_string()).or_default();
        slot.in_flight = slot.in_flight.saturating_sub(1);
        match outcome {
            Ok(value) => {
                slot.entry = Some(CacheEntry {
                    key: key.to_string(),
                    value,
                    fetched_at: Instant::now(),
                });
                slot.error = None;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache fetch failed, keeping previous value");
                slot.error = Some(e.to_string());
            }
        }
        Self::result_of(slot, ttl)
    }

    fn result_of(slot: &Slot<T>, ttl: Duration) -> CacheResult<T> {
        CacheResult {
            data: slot.entry.as_ref().map(|e| e.value.clone()),
            is_loading: slot.in_flight > 0,
            error: slot.error.clone(),
            stale: slot.entry.as_ref().map_or(true, |e| e.is_stale(ttl)),
        }
    }
}

impl<T: Clone> Default for RequestCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
