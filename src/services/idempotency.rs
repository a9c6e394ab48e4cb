//! Idempotency-Key deduplication for financial mutation endpoints.
//!
//! A client retrying a POST with the same `Idempotency-Key` header gets
//! back the first response instead of re-executing the handler. A
//! short-lived lock key covers the window between "not yet cached" and
//! "cached", so two concurrent retries can't both run the handler.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::infrastructure::{cache::CacheBackend, state::AppState};

use super::errors::ServiceError;

const RESPONSE_TTL_SECONDS: u64 = 86_400;
const LOCK_TTL_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

pub enum IdempotencyCheck {
    /// No prior attempt recorded; the lock was acquired and the caller
    /// should process the request and call `store`.
    Proceed,
    /// A prior attempt already completed; replay its response verbatim.
    Replay(CachedResponse),
}

pub struct IdempotencyService {
    cache: Arc<dyn CacheBackend>,
}

impl IdempotencyService {
    pub fn new(state: &AppState) -> Self {
        Self {
            cache: state.cache.clone(),
        }
    }

    fn response_key(tenant_id: &str, key: &str) -> String {
        format!("idempotency:{tenant_id}:{key}")
    }

    fn lock_key(tenant_id: &str, key: &str) -> String {
        format!("idempotency_lock:{tenant_id}:{key}")
    }

    /// Looks up a cached response or claims the processing lock.
    /// Returns `ConcurrentRequest` if another in-flight request already
    /// holds the lock for this key. A cache failure at any point falls
    /// back to letting the handler run uncached rather than failing the
    /// request.
    pub async fn begin(
        &self,
        tenant_id: &str,
        idempotency_key: &str,
    ) -> Result<IdempotencyCheck, ServiceError> {
        let response_key = Self::response_key(tenant_id, idempotency_key);
        let cached = match self.cache.get(&response_key).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!(error = %err, "idempotency cache unreachable, proceeding without caching");
                return Ok(IdempotencyCheck::Proceed);
            }
        };
        if let Some(cached) = cached {
            let response: CachedResponse = serde_json::from_str(&cached)
                .map_err(|err| ServiceError::Internal(err.to_string()))?;
            return Ok(IdempotencyCheck::Replay(response));
        }

        let lock_key = Self::lock_key(tenant_id, idempotency_key);
        match self.cache.set_nx_ex(&lock_key, "1", LOCK_TTL_SECONDS).await {
            Ok(true) => Ok(IdempotencyCheck::Proceed),
            Ok(false) => Err(ServiceError::ConcurrentRequest),
            Err(err) => {
                warn!(error = %err, "idempotency cache unreachable, proceeding without caching");
                Ok(IdempotencyCheck::Proceed)
            }
        }
    }

    /// Caches the response for future replays and releases the lock.
    /// Callers should only cache 2xx/4xx responses, never 5xx, so a
    /// transient failure can be retried instead of replayed forever. A
    /// cache failure here is logged and swallowed: the handler already
    /// ran, so the request must not fail on its way out.
    pub async fn store(&self, tenant_id: &str, idempotency_key: &str, response: &CachedResponse) {
        let response_key = Self::response_key(tenant_id, idempotency_key);
        let payload = match serde_json::to_string(response) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize idempotency response, not caching");
                return;
            }
        };
        if let Err(err) = self
            .cache
            .set_ex(&response_key, &payload, RESPONSE_TTL_SECONDS)
            .await
        {
            warn!(error = %err, "idempotency cache unreachable, response not cached");
        }
        if let Err(err) = self
            .cache
            .delete(&Self::lock_key(tenant_id, idempotency_key))
            .await
        {
            warn!(error = %err, "idempotency cache unreachable, lock not released");
        }
    }

    /// Releases the lock without caching a response, so a failed attempt
    /// can be retried immediately.
    pub async fn abandon(&self, tenant_id: &str, idempotency_key: &str) {
        if let Err(err) = self
            .cache
            .delete(&Self::lock_key(tenant_id, idempotency_key))
            .await
        {
            warn!(error = %err, "idempotency cache unreachable, lock not released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::InMemoryCache;

    fn service() -> IdempotencyService {
        IdempotencyService {
            cache: Arc::new(InMemoryCache::new()),
        }
    }

    #[tokio::test]
    async fn first_attempt_proceeds_then_replays_on_retry() {
        let svc = service();
        match svc.begin("tenant-1", "key-1").await.unwrap() {
            IdempotencyCheck::Proceed => {}
            IdempotencyCheck::Replay(_) => panic!("expected Proceed on first attempt"),
        }

        let response = CachedResponse {
            status_code: 201,
            body: serde_json::json!({"id": "abc"}),
        };
        svc.store("tenant-1", "key-1", &response).await;

        match svc.begin("tenant-1", "key-1").await.unwrap() {
            IdempotencyCheck::Replay(cached) => assert_eq!(cached.status_code, 201),
            IdempotencyCheck::Proceed => panic!("expected replay after store"),
        }
    }

    #[tokio::test]
    async fn concurrent_attempt_is_rejected_while_lock_held() {
        let svc = service();
        let _ = svc.begin("tenant-1", "key-2").await.unwrap();
        let second = svc.begin("tenant-1", "key-2").await;
        assert!(matches!(second, Err(ServiceError::ConcurrentRequest)));
    }
}
