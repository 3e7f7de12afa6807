//! Typed view over a [`CacheStore`]: namespaced keys and JSON values.
//!
//! Backend failures never surface to callers. A failed `get` is a miss and
//! a failed `set` is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use bindora_common::{BindoraError, Result, TargetInfo};
use bindora_config::{CacheBackend, CacheConfig};

use crate::keys;
use crate::memory::InMemoryCache;
use crate::redis::RedisCache;
use crate::store::CacheStore;
use crate::tiered::TieredCache;

#[derive(Clone)]
pub struct EmbeddingCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    enabled: bool,
}

impl EmbeddingCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl, enabled: true }
    }

    /// Backend chosen by `[cache] backend`. Redis is not contacted here;
    /// only a malformed `redis_url` fails.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let ttl = Duration::from_secs(config.ttl_seconds);
        let store: Arc<dyn CacheStore> = match config.backend {
            CacheBackend::Memory => Arc::new(InMemoryCache::new(config.max_entries)),
            CacheBackend::Redis => {
                let url = config.redis_url.as_deref().ok_or_else(|| {
                    BindoraError::Config("cache.redis_url is required for the redis backend".to_string())
                })?;
                let shared: Arc<dyn CacheStore> = Arc::new(RedisCache::new(url)?);
                if config.l1_entries > 0 {
                    Arc::new(TieredCache::new(InMemoryCache::new(config.l1_entries), shared, ttl))
                } else {
                    shared
                }
            }
        };
        Ok(Self::new(store, ttl))
    }

    /// A cache that stores nothing and always misses.
    pub fn disabled() -> Self {
        Self {
            store: Arc::new(InMemoryCache::new(1)),
            ttl: Duration::ZERO,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Cached value undecodable, treating as miss");
                None
            }
        }
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if !self.enabled {
            return;
        }
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode cache value");
                return;
            }
        };
        if let Err(e) = self.store.set(key, bytes, self.ttl).await {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    // ── Typed helpers ────────────────────────────────────────────────────────

    pub async fn get_target(&self, model: &str, sequence: &str) -> Option<Vec<f32>> {
        self.get_json(&keys::target_key(model, sequence)).await
    }

    pub async fn put_target(&self, model: &str, sequence: &str, embedding: &[f32]) {
        self.put_json(&keys::target_key(model, sequence), embedding).await
    }

    pub async fn get_molecule(&self, model: &str, structure: &str) -> Option<Vec<f32>> {
        self.get_json(&keys::molecule_key(model, structure)).await
    }

    pub async fn put_molecule(&self, model: &str, structure: &str, fingerprint: &[f32]) {
        self.put_json(&keys::molecule_key(model, structure), fingerprint).await
    }

    pub async fn get_resolved(&self, kind: &str, query: &str) -> Option<Vec<String>> {
        self.get_json(&keys::resolve_key(kind, query)).await
    }

    pub async fn put_resolved(&self, kind: &str, query: &str, sequences: &[String]) {
        self.put_json(&keys::resolve_key(kind, query), sequences).await
    }

    pub async fn get_target_info(&self, id: &str) -> Option<TargetInfo> {
        self.get_json(&keys::target_info_key(id)).await
    }

    pub async fn put_target_info(&self, id: &str, info: &TargetInfo) {
        self.put_json(&keys::target_info_key(id), info).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        self.store.is_empty().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// Backend whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(BindoraError::Cache("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
            Err(BindoraError::Cache("connection refused".into()))
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
        async fn len(&self) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_target_round_trip() {
        let cache = EmbeddingCache::from_config(&CacheConfig::default()).unwrap();
        cache.put_target("stub", "MKT", &[0.5, -0.25]).await;
        assert_eq!(cache.get_target("stub", "MKT").await, Some(vec![0.5, -0.25]));
        assert_eq!(cache.get_target("other-model", "MKT").await, None);
        assert_eq!(cache.get_molecule("stub", "MKT").await, None);
    }

    #[tokio::test]
    async fn test_resolved_sequences_cached_by_normalised_query() {
        let cache = EmbeddingCache::from_config(&CacheConfig::default()).unwrap();
        cache.put_resolved("disease", "Breast Cancer", &["MKT".to_string()]).await;
        assert_eq!(
            cache.get_resolved("disease", "breast  cancer").await,
            Some(vec!["MKT".to_string()])
        );
    }

    #[tokio::test]
    async fn test_target_info_round_trip() {
        let cache = EmbeddingCache::from_config(&CacheConfig::default()).unwrap();
        let info = TargetInfo {
            accession: "P01116".into(),
            gene: Some("KRAS".into()),
            go_terms: vec!["GO:0005525 F:GTP binding".into()],
            ..Default::default()
        };
        cache.put_target_info("kras", &info).await;
        assert_eq!(cache.get_target_info("KRAS").await, Some(info));
        assert_eq!(cache.get_target_info("TP53").await, None);
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let cache = EmbeddingCache::disabled();
        cache.put_target("stub", "MKT", &[1.0]).await;
        assert_eq!(cache.get_target("stub", "MKT").await, None);
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_backend_errors_downgrade_to_miss() {
        let cache = EmbeddingCache::new(Arc::new(BrokenStore), Duration::from_secs(60));
        cache.put_molecule("stub", "CCO", &[1.0]).await;
        assert_eq!(cache.get_molecule("stub", "CCO").await, None);
    }

    #[tokio::test]
    async fn test_undecodable_value_is_miss() {
        let store = Arc::new(InMemoryCache::new(8));
        store
            .set(&keys::target_key("stub", "MKT"), b"not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = EmbeddingCache::new(store, Duration::from_secs(60));
        assert_eq!(cache.get_target("stub", "MKT").await, None);
    }

    /// Redis URL on a loopback port nobody listens on.
    async fn unreachable_redis(l1_entries: usize) -> CacheConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        CacheConfig {
            backend: CacheBackend::Redis,
            redis_url: Some(format!("redis://{addr}")),
            l1_entries,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_a_miss() {
        let cache = EmbeddingCache::from_config(&unreachable_redis(0).await).unwrap();
        cache.put_target("stub", "MKT", &[1.0]).await;
        assert_eq!(cache.get_target("stub", "MKT").await, None);
        assert!(cache.len().await.is_err());
    }

    #[tokio::test]
    async fn test_local_tier_in_front_of_unreachable_redis() {
        let cache = EmbeddingCache::from_config(&unreachable_redis(16).await).unwrap();
        cache.put_target("stub", "MKT", &[1.0]).await;
        assert_eq!(cache.get_target("stub", "MKT").await, Some(vec![1.0]));
    }

    #[test]
    fn test_redis_backend_without_url_rejected() {
        let config = CacheConfig { backend: CacheBackend::Redis, ..Default::default() };
        assert!(matches!(EmbeddingCache::from_config(&config), Err(BindoraError::Config(_))));

        let disabled = CacheConfig { enabled: false, ..config };
        assert!(!EmbeddingCache::from_config(&disabled).unwrap().is_enabled());
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let config = CacheConfig { ttl_seconds: u64::MAX, ..Default::default() };
        let cache = EmbeddingCache::from_config(&config).unwrap();
        cache.put_target("stub", "MKT", &[0.5]).await;
        assert_eq!(cache.get_target("stub", "MKT").await, Some(vec![0.5]));
    }

    #[tokio::test]
    async fn test_clear_and_len() {
        let cache = EmbeddingCache::from_config(&CacheConfig::default()).unwrap();
        cache.put_target("stub", "A", &[1.0]).await;
        cache.put_molecule("stub", "C", &[1.0]).await;
        assert_eq!(cache.len().await.unwrap(), 2);
        cache.clear().await.unwrap();
        assert!(cache.is_empty().await.unwrap());
    }
}
