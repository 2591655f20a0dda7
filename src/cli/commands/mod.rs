//! CLI command implementations

pub mod activate;
pub mod caches;
pub mod config;
pub mod fetch;
pub mod install;
pub mod up;

pub use activate::execute as activate;
pub use caches::execute as caches;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::execute as install;
pub use up::execute as up;

use crate::cache::CacheVersion;
use crate::config::{Config, StorageBackend};
use crate::error::ReadThroughResult;
use crate::factory::create_worker;
use crate::lifecycle::{LifecycleHost, RecordingHost, ServiceWorker, WorkerPhase, WorkerRecord};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// The worker for the configured version, plus the previously activated
/// version while the configured one has not taken control.
pub(crate) struct WorkerHandle {
    pub worker: ServiceWorker,
    version: CacheVersion,
    /// Activated version that keeps serving until `worker` activates
    active: Option<ServiceWorker>,
    /// None when storage does not outlive the process
    state_path: Option<PathBuf>,
}

impl WorkerHandle {
    /// Build the worker, resuming the recorded phase for this version
    pub async fn open(config: &Config) -> ReadThroughResult<Self> {
        let version = CacheVersion(config.cache.version);
        let state_path = match config.storage.backend {
            StorageBackend::Disk => Some(config.storage.worker_state_path()),
            StorageBackend::Memory => None,
        };

        let record = match &state_path {
            Some(path) => WorkerRecord::load(path).await?.unwrap_or_default(),
            None => WorkerRecord::default(),
        };
        let phase = record.phase_for(version);
        debug!("Worker for version {} resuming as {}", version, phase);

        let host: Arc<dyn LifecycleHost> = Arc::new(RecordingHost::new());
        let worker = create_worker(config, host.clone(), phase);

        let active = match record.active {
            Some(active) if active != version => {
                debug!("Version {} stays in control until {} activates", active, version);
                let mut previous = config.clone();
                previous.cache.version = active.0;
                Some(create_worker(&previous, host, WorkerPhase::Activated))
            }
            _ => None,
        };

        Ok(Self {
            worker,
            version,
            active,
            state_path,
        })
    }

    /// The worker that answers requests right now
    pub async fn serving(&self) -> &ServiceWorker {
        if self.worker.phase().await.can_serve() {
            return &self.worker;
        }
        self.active.as_ref().unwrap_or(&self.worker)
    }

    /// Fold the worker's current phase into the persisted record
    pub async fn persist(&self) -> ReadThroughResult<()> {
        if let Some(path) = &self.state_path {
            let mut record = WorkerRecord::load(path).await?.unwrap_or_default();
            record.record(self.version, self.worker.phase().await);
            record.save(path).await?;
        }
        Ok(())
    }
}
