//! Two-tier store: a per-process LRU in front of a shared backend.
//!
//! Reads try the local tier first and fill it from the shared tier on a hit.
//! Writes go to both. The shared tier is authoritative for `len`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use bindora_common::Result;

use crate::memory::InMemoryCache;
use crate::store::CacheStore;

pub struct TieredCache {
    local: InMemoryCache,
    shared: Arc<dyn CacheStore>,
    /// Lifetime of entries copied down from the shared tier, whose own
    /// remaining TTL is not known.
    fill_ttl: Duration,
}

impl TieredCache {
    pub fn new(local: InMemoryCache, shared: Arc<dyn CacheStore>, fill_ttl: Duration) -> Self {
        Self { local, shared, fill_ttl }
    }
}

#[async_trait]
impl CacheStore for TieredCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.local.get(key).await? {
            return Ok(Some(value));
        }
        let value = self.shared.get(key).await?;
        if let Some(bytes) = &value {
            debug!(key, "Filled local cache tier from shared tier");
            self.local.set(key, bytes.clone(), self.fill_ttl).await?;
        }
        Ok(value)
    }

    /// The local write always lands; a shared-tier failure is still returned.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.local.set(key, value.clone(), ttl).await?;
        self.shared.set(key, value, ttl).await
    }

    async fn clear(&self) -> Result<()> {
        self.local.clear().await?;
        self.shared.clear().await
    }

    async fn len(&self) -> Result<usize> {
        self.shared.len().await
    }
}
