//! Explicit query-result cache.
//!
//! A [`QueryCache`] maps a query's identity (its key) to the last result
//! loaded for it. Writers that change the underlying data call
//! [`QueryCache::invalidate`] or [`QueryCache::invalidate_all`]; entries also
//! expire after the configured TTL.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::future::Cache;
use tracing::debug;

use crate::config::CacheConfig;

#[derive(Clone)]
pub struct QueryCache<K, V> {
    inner: Cache<K, V>,
    /// Bumped by `invalidate_all` so loads that started earlier do not repopulate the cache.
    generation: Arc<AtomicU64>,
}

impl<K, V> QueryCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.ttl)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    /// Return the cached value for `key`, or run `load` and cache its result.
    /// Errors are returned as-is and never cached.
    pub async fn get_or_load<F, Fut, E>(&self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(cached) = self.inner.get(&key).await {
            debug!("Query cache hit");
            return Ok(cached);
        }

        debug!("Query cache miss, loading");
        let generation = self.generation.load(Ordering::Acquire);
        let value = load().await?;

        self.inner.insert(key.clone(), value.clone()).await;
        // An invalidate_all that ran at any point after the load started may
        // have missed this entry; drop it again.
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("Query cache invalidated during load, discarding result");
            self.inner.invalidate(&key).await;
        }
        Ok(value)
    }

    pub async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.invalidate_all();
    }
}
