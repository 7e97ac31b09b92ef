use std::sync::Arc;
use std::time::Duration;

use super::{CacheResult, RequestCache};
use crate::backend::ChatBackend;
use crate::constants::EXPERT_CACHE_KEY;
use crate::models::{default_expert, Expert};

/// Cache-backed view of the backend's expert list.
#[derive(Clone)]
pub struct ExpertDirectory {
    backend: Arc<dyn ChatBackend>,
    cache: Arc<RequestCache<Vec<Expert>>>,
    ttl: Duration,
}

impl ExpertDirectory {
    pub fn new(backend: Arc<dyn ChatBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            cache: Arc::new(RequestCache::new()),
            ttl,
        }
    }

    pub async fn experts(&self) -> CacheResult<Vec<Expert>> {
        let backend = self.backend.clone();
        self.cache
            .get(EXPERT_CACHE_KEY, self.ttl, || async move {
                backend.list_experts().await
            })
            .await
    }

    pub async fn refresh(&self) -> CacheResult<Vec<Expert>> {
        let backend = self.backend.clone();
        self.cache
            .refresh(EXPERT_CACHE_KEY, self.ttl, || async move {
                backend.list_experts().await
            })
            .await
    }

    /// Revalidate if stale; no request when the cached list is still fresh.
    pub async fn on_focus(&self) -> Option<CacheResult<Vec<Expert>>> {
        let backend = self.backend.clone();
        self.cache
            .revalidate_on_focus(EXPERT_CACHE_KEY, self.ttl, || async move {
                backend.list_experts().await
            })
            .await
    }

    /// Cached list without hitting the backend.
    pub fn peek(&self) -> CacheResult<Vec<Expert>> {
        self.cache.peek(EXPERT_CACHE_KEY, self.ttl)
    }

    /// Active expert, else the first listed. `None` when the list is empty
    /// or could not be fetched at all.
    pub async fn default_expert_id(&self) -> Option<i64> {
        let result = self.experts().await;
        let experts = result.data?;
        default_expert(&experts).map(|e| e.id)
    }

    pub fn invalidate(&self) {
        self.cache.invalidate(EXPERT_CACHE_KEY);
    }
}

impl std::fmt::Debug for ExpertDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpertDirectory")
            .field("ttl", &self.ttl)
            .finish()
    }
}
