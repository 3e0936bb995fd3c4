use std::time::Duration;

use async_trait::async_trait;
use mini_moka::sync::Cache;
use thiserror::Error;

use crate::CacheKey;

/// Errors a cache backend may surface. The pipeline logs them and treats
/// the operation as a miss; they never fail a run.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("cache backend unreachable: {0}")]
    Unreachable(String),
    /// A stored value could not be decoded.
    #[error("cache entry could not be decoded: {0}")]
    Corrupt(String),
}

/// Storage contract for finalized outputs.
///
/// Implementations must honor the TTL they were configured with; a `get`
/// after expiry returns `None`.
#[async_trait]
pub trait CacheStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Look up a finalized output.
    async fn get(&self, key: &CacheKey) -> Result<Option<V>, CacheError>;

    /// Store a finalized output under the key.
    async fn put(&self, key: &CacheKey, value: V) -> Result<(), CacheError>;
}

/// In-memory store backed by a TTL + capacity bounded cache.
pub struct MemoryCache<V> {
    inner: Cache<String, V>,
}

impl<V> MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a store holding at most `max_entries` values for `ttl` each.
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { inner }
    }
}

#[async_trait]
impl<V> CacheStore<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> Result<Option<V>, CacheError> {
        Ok(self.inner.get(&key.as_str().to_string()))
    }

    async fn put(&self, key: &CacheKey, value: V) -> Result<(), CacheError> {
        self.inner.insert(key.as_str().to_string(), value);
        Ok(())
    }
}
