//! Lifecycle driver enforcing install -> activate -> serve ordering

use crate::error::{ReadThroughError, ReadThroughResult};
use crate::http::Request;
use crate::lifecycle::state::WorkerPhase;
use crate::manager::{ActivateReport, InstallReport, ReadThroughCache, Served};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One worker version wrapping a cache manager
pub struct ServiceWorker {
    cache: ReadThroughCache,
    phase: Mutex<WorkerPhase>,
}

impl ServiceWorker {
    /// A freshly parsed worker that has not been installed
    pub fn new(cache: ReadThroughCache) -> Self {
        Self::resume(cache, WorkerPhase::Parsed)
    }

    /// A worker resuming from a previously recorded phase
    pub fn resume(cache: ReadThroughCache, phase: WorkerPhase) -> Self {
        Self {
            cache,
            phase: Mutex::new(phase),
        }
    }

    /// Current phase
    pub async fn phase(&self) -> WorkerPhase {
        *self.phase.lock().await
    }

    /// Move to `next` if `allowed` holds for the current phase.
    /// Returns the phase that was left.
    async fn enter(
        &self,
        operation: &str,
        allowed: fn(&WorkerPhase) -> bool,
        next: WorkerPhase,
    ) -> ReadThroughResult<WorkerPhase> {
        let mut phase = self.phase.lock().await;
        if !allowed(&*phase) {
            return Err(ReadThroughError::InvalidPhase {
                operation: operation.to_string(),
                phase: phase.to_string(),
            });
        }
        let previous = *phase;
        *phase = next;
        Ok(previous)
    }

    async fn set(&self, next: WorkerPhase) {
        *self.phase.lock().await = next;
    }

    /// Run the install step.
    ///
    /// A failed install makes a pending version redundant. An activated
    /// worker that re-installs stays activated whatever the outcome, since
    /// a failed precache stores nothing.
    pub async fn install(&self) -> ReadThroughResult<InstallReport> {
        let previous = self
            .enter("install", WorkerPhase::can_install, WorkerPhase::Installing)
            .await?;
        let was_active = previous == WorkerPhase::Activated;

        match self.cache.install().await {
            Ok(report) => {
                self.set(if was_active {
                    WorkerPhase::Activated
                } else {
                    WorkerPhase::Installed
                })
                .await;
                Ok(report)
            }
            Err(e) if was_active => {
                warn!("Re-install failed, keeping the active caches: {}", e);
                self.set(WorkerPhase::Activated).await;
                Err(e)
            }
            Err(e) => {
                warn!("Install failed, worker is redundant: {}", e);
                self.set(WorkerPhase::Redundant).await;
                Err(e)
            }
        }
    }

    /// Run the activate step. On failure the worker returns to the phase it
    /// started from, so activation can be attempted again.
    pub async fn activate(&self) -> ReadThroughResult<ActivateReport> {
        let previous = self
            .enter("activate", WorkerPhase::can_activate, WorkerPhase::Activating)
            .await?;

        match self.cache.activate().await {
            Ok(report) => {
                self.set(WorkerPhase::Activated).await;
                info!("Worker activated");
                Ok(report)
            }
            Err(e) => {
                self.set(previous).await;
                Err(e)
            }
        }
    }

    /// Serve a request. Only an activated worker serves.
    pub async fn handle_fetch(&self, request: &Request) -> ReadThroughResult<Served> {
        let phase = self.phase().await;
        if !phase.can_serve() {
            return Err(ReadThroughError::InvalidPhase {
                operation: "serve".to_string(),
                phase: phase.to_string(),
            });
        }
        self.cache.serve(request).await
    }
}
