//! In-process cache storage

use crate::cache::storage::{Cache, CacheStorage};
use crate::error::ReadThroughResult;
use crate::http::{Request, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A cache held in memory
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<String, (Request, Response)>>,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, request: &Request) -> ReadThroughResult<Option<Response>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&request.cache_key())
            .map(|(_, response)| response.clone()))
    }

    async fn put(&self, request: &Request, response: Response) -> ReadThroughResult<()> {
        self.entries
            .write()
            .await
            .insert(request.cache_key(), (request.clone(), response));
        Ok(())
    }

    async fn put_all(&self, batch: Vec<(Request, Response)>) -> ReadThroughResult<()> {
        // Single write guard so readers never observe a partial batch
        let mut entries = self.entries.write().await;
        for (request, response) in batch {
            entries.insert(request.cache_key(), (request, response));
        }
        Ok(())
    }

    async fn entries(&self) -> ReadThroughResult<Vec<Request>> {
        let entries = self.entries.read().await;
        let mut requests: Vec<Request> = entries.values().map(|(req, _)| req.clone()).collect();
        requests.sort_by_key(|r| r.cache_key());
        Ok(requests)
    }
}

/// Cache storage held in memory, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStorage {
    caches: RwLock<HashMap<String, Arc<MemoryCache>>>,
}

impl MemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> ReadThroughResult<Arc<dyn Cache>> {
        if let Some(cache) = self.caches.read().await.get(name) {
            return Ok(cache.clone());
        }

        let mut caches = self.caches.write().await;
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new(name)))
            .clone();
        Ok(cache)
    }

    async fn keys(&self) -> ReadThroughResult<Vec<String>> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> ReadThroughResult<bool> {
        Ok(self.caches.write().await.remove(name).is_some())
    }
}

/// Memory storage whose enumeration or deletion can be made to fail
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FaultyStorage {
    pub inner: MemoryStorage,
    pub fail_keys: std::sync::atomic::AtomicBool,
    pub fail_delete: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
#[async_trait]
impl CacheStorage for FaultyStorage {
    async fn open(&self, name: &str) -> ReadThroughResult<Arc<dyn Cache>> {
        self.inner.open(name).await
    }

    async fn keys(&self) -> ReadThroughResult<Vec<String>> {
        if self.fail_keys.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::error::ReadThroughError::CacheEnumeration(
                "permission denied".to_string(),
            ));
        }
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> ReadThroughResult<bool> {
        if self.fail_delete.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::error::ReadThroughError::CacheDeletion {
                name: name.to_string(),
                reason: "device busy".to_string(),
            });
        }
        self.inner.delete(name).await
    }
}
