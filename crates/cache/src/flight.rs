use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{CacheKey, CacheStore};

/// Collapses concurrent computations for the same cache key.
///
/// The first caller for a key runs the producer while later callers wait on
/// a per-key lock and then find the stored value. Store errors are logged
/// and treated as misses so a broken backend degrades to recomputation, not
/// failure.
#[derive(Default)]
pub struct SingleFlight {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SingleFlight {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, or run `produce` exactly once per
    /// burst of concurrent callers and cache its output.
    ///
    /// The boolean is true on a cache hit. A producer error is returned to
    /// every caller that ran it and nothing is cached.
    pub async fn compute_if_absent<V, E, F, Fut>(
        &self,
        store: &dyn CacheStore<V>,
        key: &CacheKey,
        produce: F,
    ) -> Result<(V, bool), E>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.lookup(store, key).await {
            return Ok((value, true));
        }

        let lock = self
            .locks
            .entry(key.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lock.lock().await;

        // Somebody else finished the computation while we waited.
        if let Some(value) = self.lookup(store, key).await {
            return Ok((value, true));
        }

        let produced = produce().await;

        if let Ok(value) = &produced
            && let Err(err) = store.put(key, value.clone()).await
        {
            log::warn!("failed to cache output for {key}: {err}");
        }

        drop(guard);
        self.locks.remove(key.as_str());

        produced.map(|value| (value, false))
    }

    async fn lookup<V>(&self, store: &dyn CacheStore<V>, key: &CacheKey) -> Option<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        match store.get(key).await {
            Ok(found) => found,
            Err(err) => {
                log::warn!("cache lookup for {key} failed, treating as miss: {err}");
                None
            }
        }
    }
}
