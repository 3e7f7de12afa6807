//! Shared cache backend on Redis.
//!
//! Entries are written with `SETEX` under a `bindora:` prefix so several
//! services can share one server. The connection is opened on first use and
//! kept by a [`ConnectionManager`], which reconnects on its own afterwards.
//! A server that cannot be reached surfaces as [`BindoraError::Cache`], which
//! [`EmbeddingCache`](crate::EmbeddingCache) downgrades to a miss.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use bindora_common::{BindoraError, Result};

use crate::store::CacheStore;

pub const KEY_PREFIX: &str = "bindora:";

/// Upper bound for `SETEX` seconds; keeps `now + ttl` inside Redis' clock range.
const MAX_EXPIRY_SECS: u64 = u32::MAX as u64;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

fn cache_error(op: &str, e: impl std::fmt::Display) -> BindoraError {
    BindoraError::Cache(format!("redis {op} failed: {e}"))
}

/// Whole seconds for `SETEX`, rounded up. Redis rejects an expiry of 0.
pub fn expiry_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));
    secs.clamp(1, MAX_EXPIRY_SECS)
}

pub struct RedisCache {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    prefix: String,
}

impl RedisCache {
    /// Parse `url` without connecting.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_prefix(url, KEY_PREFIX)
    }

    pub fn with_prefix(url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| BindoraError::Config(format!("invalid cache.redis_url '{url}': {e}")))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            prefix: prefix.to_string(),
        })
    }

    pub fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// `SCAN MATCH` pattern covering every key this cache wrote.
    pub fn scan_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + 1);
        for c in self.prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }

    /// Connection handle, connecting on first use. A failed attempt is not
    /// remembered, so the next call tries again.
    async fn connection(&self) -> Result<ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(self.client.clone()))
                    .await
                    .map_err(|_| cache_error("connect", "timed out"))?
                    .map_err(|e| {
                        warn!(error = %e, "Redis cache unavailable");
                        cache_error("connect", e)
                    })?;
                info!("Redis cache connected");
                Ok::<_, BindoraError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }

    /// Every key under the prefix. `SCAN` may repeat keys, so they are deduplicated.
    async fn scan_keys(&self, conn: &mut ConnectionManager) -> Result<HashSet<String>> {
        let pattern = self.scan_pattern();
        let mut keys = HashSet::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(|e| cache_error("scan", e))?;
            keys.extend(batch);
            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| cache_error("get", e))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("SETEX")
            .arg(self.namespaced(key))
            .arg(expiry_secs(ttl))
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| cache_error("set", e))
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = self.scan_keys(&mut conn).await?.into_iter().collect();
        for chunk in keys.chunks(SCAN_BATCH) {
            redis::cmd("DEL")
                .arg(chunk)
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| cache_error("delete", e))?;
        }
        debug!(removed = keys.len(), "Cleared redis cache");
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.connection().await?;
        Ok(self.scan_keys(&mut conn).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A loopback address with nothing listening on it.
    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("redis://{addr}")
    }

    #[test]
    fn test_keys_are_prefixed() {
        let cache = RedisCache::new("redis://127.0.0.1:6379/0").unwrap();
        assert_eq!(cache.namespaced("target:stub:abc"), "bindora:target:stub:abc");
        assert_eq!(cache.scan_pattern(), "bindora:*");
    }

    #[test]
    fn test_prefix_glob_characters_escaped() {
        let cache = RedisCache::with_prefix("redis://127.0.0.1:6379", "team[a]*:").unwrap();
        assert_eq!(cache.namespaced("k"), "team[a]*:k");
        assert_eq!(cache.scan_pattern(), "team\\[a\\]\\*:*");
    }

    #[test]
    fn test_expiry_rounds_up_and_is_bounded() {
        assert_eq!(expiry_secs(Duration::ZERO), 1);
        assert_eq!(expiry_secs(Duration::from_millis(10)), 1);
        assert_eq!(expiry_secs(Duration::from_millis(1_500)), 2);
        assert_eq!(expiry_secs(Duration::from_secs(3_600)), 3_600);
        assert_eq!(expiry_secs(Duration::MAX), MAX_EXPIRY_SECS);
    }

    #[test]
    fn test_malformed_url_is_config_error() {
        assert!(matches!(RedisCache::new("not a url"), Err(BindoraError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_cache_error() {
        let cache = RedisCache::new(&closed_port_url().await).unwrap();
        assert!(matches!(cache.get("k").await, Err(BindoraError::Cache(_))));
        assert!(matches!(
            cache.set("k", b"v".to_vec(), Duration::from_secs(60)).await,
            Err(BindoraError::Cache(_))
        ));
    }
}
