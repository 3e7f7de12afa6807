use std::time::Duration;

use async_trait::async_trait;
use bindora_common::Result;

/// A key/value store with per-entry time-to-live.
///
/// Implementations must be safe under concurrent access. An entry past its
/// TTL is never returned by `get`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    /// Number of live (non-expired) entries.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
