//! bindora-cache: TTL key/value store shared by the scorer and the resolver.
//!
//! [`CacheStore`] is the backend seam. [`InMemoryCache`] is the default
//! backend; [`RedisCache`] is shared between processes and usually sits
//! behind a [`TieredCache`]. [`EmbeddingCache`] layers namespaced keys and
//! JSON values on top.

pub mod embeddings;
pub mod keys;
pub mod memory;
pub mod redis;
pub mod store;
pub mod tiered;

pub use embeddings::EmbeddingCache;
pub use memory::InMemoryCache;
pub use crate::redis::RedisCache;
pub use store::CacheStore;
pub use tiered::TieredCache;
