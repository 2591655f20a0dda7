//! Worker lifecycle
//!
//! A worker version moves through install and activate before it may serve
//! requests. The host receives two signals along the way: skip-waiting after
//! a successful install, claim-clients after a successful activate.

mod state;
mod worker;

pub use state::{PendingWorker, WorkerPhase, WorkerRecord};
pub use worker::ServiceWorker;

use crate::error::ReadThroughResult;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Signals the cache manager sends to whatever hosts the worker
#[async_trait]
pub trait LifecycleHost: Send + Sync {
    /// Activate the newly installed version without waiting for the
    /// previous one to be released
    async fn skip_waiting(&self) -> ReadThroughResult<()>;

    /// Take control of every open client immediately
    async fn claim_clients(&self) -> ReadThroughResult<()>;
}

/// Host that records the signals it receives
#[derive(Debug, Default)]
pub struct RecordingHost {
    skipped_waiting: AtomicBool,
    claimed_clients: AtomicBool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether skip-waiting has been signalled
    pub fn skipped_waiting(&self) -> bool {
        self.skipped_waiting.load(Ordering::SeqCst)
    }

    /// Whether claim-clients has been signalled
    pub fn claimed_clients(&self) -> bool {
        self.claimed_clients.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LifecycleHost for RecordingHost {
    async fn skip_waiting(&self) -> ReadThroughResult<()> {
        info!("Skipping wait for previous worker version");
        self.skipped_waiting.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn claim_clients(&self) -> ReadThroughResult<()> {
        info!("Claiming clients");
        self.claimed_clients.store(true, Ordering::SeqCst);
        Ok(())
    }
}
