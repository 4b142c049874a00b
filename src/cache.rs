use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// Invalidation side of a client query cache.
///
/// Mutations only ever need to mark results stale; readers own the rest.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Mark the collection stored under `key` as stale
    async fn invalidate(&self, key: &str) -> Result<()>;

    /// Mark every cached collection as stale
    async fn invalidate_all(&self) -> Result<()>;
}

/// Cache for callers that have no read side
pub struct NoOpCache;

#[async_trait]
impl Cache for NoOpCache {
    async fn invalidate(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<()> {
        Ok(())
    }
}

/// Invalidation count of a key, paired with the cache-wide count
type Stamp = (u64, u64);

/// Keyed query results. An invalidated key is dropped, so the next
/// `get_or_fetch` goes back to the source.
///
/// Every value is stamped with the key's generation when its load starts.
/// A load that an invalidation overtook is discarded instead of served.
#[derive(Clone)]
pub struct QueryCache<V> {
    inner: moka::future::Cache<String, (Stamp, V)>,
    generations: Arc<DashMap<String, u64>>,
    epoch: Arc<AtomicU64>,
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, ttl: Option<Duration>) -> Self {
        let mut builder = moka::future::Cache::builder().max_capacity(max_capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            inner: builder.build(),
            generations: Arc::new(DashMap::new()),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    fn stamp(&self, key: &str) -> Stamp {
        let generation = self.generations.get(key).map_or(0, |g| *g);
        (self.epoch.load(Ordering::Acquire), generation)
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let (stamp, value) = self.inner.get(key).await?;
        (stamp == self.stamp(key)).then_some(value)
    }

    pub async fn insert(&self, key: &str, value: V) {
        let stamp = self.stamp(key);
        self.inner.insert(key.to_string(), (stamp, value)).await;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the cached value or resolves `fetch()` to fill it.
    /// Concurrent callers for the same key share one fetch and its error.
    /// If the key is invalidated while a fetch runs, its result is dropped
    /// and `fetch` is called again.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, mut fetch: F) -> Result<V, Arc<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        loop {
            let stamp = self.stamp(key);
            let load = fetch();
            let (loaded_at, value) = self
                .inner
                .try_get_with_by_ref(key, async move { load.await.map(|v| (stamp, v)) })
                .await?;

            if loaded_at == self.stamp(key) {
                return Ok(value);
            }

            tracing::debug!(key, "discarding value loaded before invalidation");
            self.inner.invalidate(key).await;
        }
    }
}

#[async_trait]
impl<V> Cache for QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn invalidate(&self, key: &str) -> Result<()> {
        // bump first so a load already running sees it when it lands
        *self.generations.entry(key.to_string()).or_insert(0) += 1;
        self.inner.invalidate(key).await;
        tracing::debug!(key, "query invalidated");
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<()> {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.inner.invalidate_all();
        Ok(())
    }
}
