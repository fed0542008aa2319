//! Key/value cache backed by Redis with an in-memory fallback.
//!
//! Values are opaque strings; callers encode structured data themselves.
//! Cache failures never reach callers: a networked error reads as a miss
//! and a failed write is logged and dropped.

use std::time::Duration;

use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::config::CacheConfig;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::store::degradable::{BackendMode, Degradable};

const STORE: &str = "cache";

/// Process-local stand-in. No TTL eviction.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Open a managed connection and make sure the server answers.
pub(crate) async fn open_redis(url: &str) -> redis::RedisResult<(redis::Client, ConnectionManager)> {
    let client = redis::Client::open(url)?;
    let mut manager = ConnectionManager::new(client.clone()).await?;
    let _: String = redis::cmd("PING").query_async(&mut manager).await?;
    Ok((client, manager))
}

/// Cache with graceful degradation.
#[derive(Debug)]
pub struct Cache {
    backend: Degradable<ConnectionManager, MemoryStore>,
    ping_timeout: Duration,
}

impl Cache {
    /// Probe Redis once; fall back to memory if it does not answer in time.
    pub async fn connect(config: &CacheConfig) -> Self {
        let backend = Degradable::connect(
            STORE,
            config.connect_timeout(),
            async { open_redis(&config.url).await.map(|(_, manager)| manager) },
            MemoryStore::default,
        )
        .await;
        Self {
            backend,
            ping_timeout: config.connect_timeout(),
        }
    }

    /// A cache that never touches the network.
    pub fn in_memory() -> Self {
        Self {
            backend: Degradable::Degraded(MemoryStore::default()),
            ping_timeout: CacheConfig::default().connect_timeout(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    /// True if the networked backend answers a PING within the connect
    /// timeout right now. Always false in degraded mode.
    pub async fn ping(&self) -> bool {
        let Degradable::Connected(manager) = &self.backend else {
            return false;
        };
        let mut conn = manager.clone();
        let pong = async {
            let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
            pong.map_err(|e| e.to_string())
        };
        match with_deadline(self.ping_timeout, pong, |d| format!("no answer within {:?}", d)).await {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!(error = %error, "cache.redis.ping_failed");
                false
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let value = match &self.backend {
            Degradable::Connected(manager) => {
                let mut conn = manager.clone();
                let result: redis::RedisResult<Option<String>> = conn.get(key).await;
                match result {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(key, error = %e, "cache.redis.get_failed");
                        metrics::record_cache_op("get", "error");
                        return None;
                    }
                }
            }
            Degradable::Degraded(memory) => memory.entries.get(key).map(|v| v.value().clone()),
        };

        metrics::record_cache_op("get", if value.is_some() { "hit" } else { "miss" });
        value
    }

    /// Store a value. The TTL is honoured only by the networked backend.
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        match &self.backend {
            Degradable::Connected(manager) => {
                let mut conn = manager.clone();
                let result: redis::RedisResult<()> = match ttl {
                    Some(ttl) => conn.set_ex(key, value, ttl.as_secs().max(1)).await,
                    None => conn.set(key, value).await,
                };
                if let Err(e) = result {
                    tracing::warn!(key, error = %e, "cache.redis.set_failed");
                    metrics::record_cache_op("set", "error");
                    return;
                }
            }
            Degradable::Degraded(memory) => {
                memory.entries.insert(key.to_string(), value.to_string());
            }
        }
        metrics::record_cache_op("set", "ok");
    }

    pub async fn delete(&self, key: &str) {
        match &self.backend {
            Degradable::Connected(manager) => {
                let mut conn = manager.clone();
                let result: redis::RedisResult<()> = conn.del(key).await;
                if let Err(e) = result {
                    tracing::warn!(key, error = %e, "cache.redis.delete_failed");
                    metrics::record_cache_op("delete", "error");
                    return;
                }
            }
            Degradable::Degraded(memory) => {
                memory.entries.remove(key);
            }
        }
        metrics::record_cache_op("delete", "ok");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> CacheConfig {
        CacheConfig {
            // Nothing listens on port 1.
            url: "redis://127.0.0.1:1/0".to_string(),
            connect_timeout_ms: 500,
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_degrades() {
        let cache = Cache::connect(&unreachable_config()).await;
        assert!(!cache.is_available());
        assert_eq!(cache.mode(), BackendMode::InMemory);
        assert!(!cache.ping().await);

        cache.set("analysis:temps", r#"{"mean":21.5}"#, Some(Duration::from_secs(300))).await;
        assert_eq!(cache.get("analysis:temps").await.as_deref(), Some(r#"{"mean":21.5}"#));

        cache.delete("analysis:temps").await;
        assert_eq!(cache.get("analysis:temps").await, None);
    }

    #[tokio::test]
    async fn test_invalid_url_degrades() {
        let config = CacheConfig {
            url: "not-a-redis-url".to_string(),
            connect_timeout_ms: 500,
        };
        let cache = Cache::connect(&config).await;
        assert!(!cache.is_available());
    }

    #[tokio::test]
    async fn test_memory_overwrite_and_missing_delete() {
        let cache = Cache::in_memory();
        cache.set("k", "v1", None).await;
        cache.set("k", "v2", None).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v2"));

        cache.delete("absent").await;
        assert_eq!(cache.get("absent").await, None);
    }
}
