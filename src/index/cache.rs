//! Process-scoped accession cache.

use super::{Accession, AccessionKey, IndexStore};
use crate::{Error, Result};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Caches loaded accessions in front of another [`IndexStore`].
///
/// Concurrent first lookups of one key share a single load; the entry is
/// installed only when that load succeeds, so a failed, timed out or
/// abandoned load leaves nothing behind and the next lookup retries.
/// Installed entries are immutable.
pub struct CachedIndexStore {
    inner: Arc<dyn IndexStore>,
    cache: Cache<AccessionKey, Arc<Accession>>,
    timeout: Duration,
}

impl CachedIndexStore {
    /// # Arguments
    ///
    /// * `inner` - store consulted on a miss
    /// * `capacity` - maximum cached accessions, unbounded when `None`
    /// * `timeout` - bound on each lookup, including a load it waits on
    pub fn new(inner: Arc<dyn IndexStore>, capacity: Option<u64>, timeout: Duration) -> Self {
        let mut builder = Cache::builder();
        if let Some(capacity) = capacity {
            builder = builder.max_capacity(capacity);
        }
        Self {
            inner,
            cache: builder.build(),
            timeout,
        }
    }

    pub fn contains(&self, key: &AccessionKey) -> bool {
        self.cache.contains_key(key)
    }
}

#[async_trait]
impl IndexStore for CachedIndexStore {
    async fn get_accession(&self, key: &AccessionKey) -> Result<Arc<Accession>> {
        let load = self.cache.try_get_with(key.clone(), async {
            tracing::debug!(accession = %key, "loading accession index");
            self.inner.get_accession(key).await
        });

        match tokio::time::timeout(self.timeout, load).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Timeout(format!("loading index for {}", key))),
        }
    }
}
