//! Builds storage, fetcher and worker from configuration

use crate::cache::{CacheStorage, DiskStorage, MemoryStorage};
use crate::config::{Config, StorageBackend};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::lifecycle::{LifecycleHost, ServiceWorker, WorkerPhase};
use crate::manager::ReadThroughCache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Create the configured cache storage backend
pub fn create_storage(config: &Config) -> Arc<dyn CacheStorage> {
    match config.storage.backend {
        StorageBackend::Disk => {
            let dir = config.storage.root();
            debug!("Using disk cache storage at {}", dir.display());
            Arc::new(DiskStorage::new(dir))
        }
        StorageBackend::Memory => {
            debug!("Using in-memory cache storage");
            Arc::new(MemoryStorage::new())
        }
    }
}

/// Create the network fetcher
pub fn create_fetcher(config: &Config) -> Arc<dyn Fetcher> {
    Arc::new(HttpFetcher::new(
        config.network.origin.clone(),
        Duration::from_secs(config.network.timeout_secs),
        &config.network.user_agent,
    ))
}

/// Create a cache manager from an already validated configuration
pub fn create_cache(config: &Config, host: Arc<dyn LifecycleHost>) -> ReadThroughCache {
    ReadThroughCache::new(
        config.cache_settings(),
        create_storage(config),
        create_fetcher(config),
        host,
    )
}

/// Create a worker resuming from `phase`
pub fn create_worker(
    config: &Config,
    host: Arc<dyn LifecycleHost>,
    phase: WorkerPhase,
) -> ServiceWorker {
    ServiceWorker::resume(create_cache(config, host), phase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::RecordingHost;
    use tempfile::TempDir;

    #[tokio::test]
    async fn disk_storage_uses_configured_dir() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.dir = Some(temp.path().join("caches"));

        let storage = create_storage(&config);
        storage.open("read-through-cache-v1").await.unwrap();

        assert!(temp.path().join("caches").join("read-through-cache-v1").is_dir());
        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["read-through-cache-v1".to_string()]
        );
    }

    #[tokio::test]
    async fn worker_resumes_phase() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;

        let worker = create_worker(&config, Arc::new(RecordingHost::new()), WorkerPhase::Activated);
        assert_eq!(worker.phase().await, WorkerPhase::Activated);
    }
}
