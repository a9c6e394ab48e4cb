use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::infrastructure::config::CacheConfig;

/// Shared key-value cache backing idempotency replay and rate limiting.
/// Both callers need get/set-with-ttl, atomic increment-with-expiry, and
/// a set-if-absent lock primitive.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()>;
    /// Returns true if the key was set (it was absent), false if it already existed.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<bool>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    /// Atomically increments `key` and ensures it expires after `ttl_seconds`
    /// (the expiry is (re)applied only when the counter is freshly created).
    async fn incr_with_expiry(&self, key: &str, ttl_seconds: u64) -> anyhow::Result<i64>;
    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> anyhow::Result<bool>;
}

pub fn build_cache(config: &CacheConfig) -> anyhow::Result<Arc<dyn CacheBackend>> {
    Ok(Arc::new(UpstashCache::new(
        config.rest_url.clone(),
        config.token.clone(),
    )?))
}

#[derive(Debug, Deserialize)]
struct UpstashReply {
    result: Option<serde_json::Value>,
}

/// HTTP REST client for an Upstash-Redis-compatible endpoint: every
/// operation is a single authenticated GET against a path-encoded
/// command, matching the wire protocol of the original cache service.
pub struct UpstashCache {
    rest_url: String,
    client: reqwest::Client,
}

impl UpstashCache {
    pub fn new(rest_url: String, token: String) -> anyhow::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth_value =
            reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            rest_url: rest_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn command(&self, path: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let url = format!("{}/{}", self.rest_url, path);
        let reply: UpstashReply = self.client.get(url).send().await?.json().await?;
        Ok(reply.result)
    }
}

#[async_trait]
impl CacheBackend for UpstashCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        match self.command(&format!("get/{key}")).await? {
            Some(serde_json::Value::String(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()> {
        self.command(&format!("set/{key}/{value}/ex/{ttl_seconds}"))
            .await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<bool> {
        let result = self
            .command(&format!("set/{key}/{value}/nx/ex/{ttl_seconds}"))
            .await?;
        Ok(matches!(result, Some(serde_json::Value::String(ok)) if ok == "OK"))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.command(&format!("del/{key}")).await?;
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, ttl_seconds: u64) -> anyhow::Result<i64> {
        let result = self.command(&format!("incr/{key}")).await?;
        let count = result
            .and_then(|value| value.as_i64())
            .ok_or_else(|| anyhow::anyhow!("unexpected incr reply for key {key}"))?;
        if count == 1 {
            self.command(&format!("expire/{key}/{ttl_seconds}")).await?;
        }
        Ok(count)
    }

    async fn ping(&self) -> anyhow::Result<bool> {
        let result = self.command("ping").await?;
        Ok(matches!(result, Some(serde_json::Value::String(pong)) if pong == "PONG"))
    }
}

/// In-process cache used by unit tests so that the idempotency and
/// rate-limit logic can be exercised without a running cache instance.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(value: &(String, Option<Instant>)) -> bool {
        match value.1 {
            Some(expires_at) => Instant::now() < expires_at,
            None => true,
        }
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if Self::is_live(entry) => Ok(Some(entry.0.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), Some(expires_at)));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<bool> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(key) {
            if Self::is_live(entry) {
                return Ok(false);
            }
        }
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        entries.insert(key.to_string(), (value.to_string(), Some(expires_at)));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, ttl_seconds: u64) -> anyhow::Result<i64> {
        let mut entries = self.entries.lock();
        let fresh = match entries.get(key) {
            Some(entry) => !Self::is_live(entry),
            None => true,
        };
        let current: i64 = if fresh {
            0
        } else {
            entries
                .get(key)
                .map(|(value, _)| value.parse().unwrap_or(0))
                .unwrap_or(0)
        };
        let next = current + 1;
        let expires_at = if fresh {
            Some(Instant::now() + Duration::from_secs(ttl_seconds))
        } else {
            entries.get(key).and_then(|entry| entry.1)
        };
        entries.insert(key.to_string(), (next.to_string(), expires_at));
        Ok(next)
    }

    async fn ping(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_nx_ex_only_succeeds_once() {
        let cache = InMemoryCache::new();
        assert!(cache.set_nx_ex("lock:1", "holder", 30).await.unwrap());
        assert!(!cache.set_nx_ex("lock:1", "holder", 30).await.unwrap());
    }

    #[tokio::test]
    async fn incr_with_expiry_counts_up() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.incr_with_expiry("rl:a", 60).await.unwrap(), 1);
        assert_eq!(cache.incr_with_expiry("rl:a", 60).await.unwrap(), 2);
        assert_eq!(cache.incr_with_expiry("rl:a", 60).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn get_returns_none_for_missing_key() {
        let cache = InMemoryCache::new();
        assert!(cache.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ping_is_always_healthy_in_memory() {
        let cache = InMemoryCache::new();
        assert!(cache.ping().await.unwrap());
    }
}
