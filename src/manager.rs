//! Read-through cache manager
//!
//! Owns the cache configuration and implements the three lifecycle
//! operations: install (precache the manifest), activate (purge caches of
//! other versions) and serve (cache first, network on miss).

use crate::cache::{CacheRegistry, CacheStorage, READ_THROUGH};
use crate::error::{ReadThroughError, ReadThroughResult};
use crate::fetch::{canonical_url, Fetcher};
use crate::http::{Request, Response};
use crate::lifecycle::LifecycleHost;
use futures_util::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Immutable cache configuration, built once at startup
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Logical to physical cache names for the current version
    pub registry: CacheRegistry,

    /// Logical cache that install populates
    pub precache: String,

    /// Resources stored unconditionally at install time
    pub manifest: Vec<String>,

    /// Store network responses on a cache miss
    pub fill_on_miss: bool,

    /// Origin relative locators resolve against. Requests are keyed by
    /// their resolved URL so every spelling of a resource shares one entry.
    pub origin: Option<String>,
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Outcome of a successful serve
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
}

/// Outcome of a successful install
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    /// Physical cache that was populated
    pub cache_name: String,
    /// Number of manifest entries stored
    pub stored: usize,
}

/// Outcome of a successful activate
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    /// Existing caches referenced by the registry
    pub kept: Vec<String>,
    /// Caches removed because no registry entry references them
    pub deleted: Vec<String>,
}

/// Read-through cache manager
pub struct ReadThroughCache {
    settings: CacheSettings,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn LifecycleHost>,
}

impl ReadThroughCache {
    /// Create a manager over the given storage, fetcher and host
    pub fn new(
        settings: CacheSettings,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn LifecycleHost>,
    ) -> Self {
        Self {
            settings,
            storage,
            fetcher,
            host,
        }
    }

    /// Precache every manifest entry into the current cache.
    ///
    /// All fetches must succeed with a 2xx status before anything is
    /// stored. Signals skip-waiting on success.
    pub async fn install(&self) -> ReadThroughResult<InstallReport> {
        let cache_name = self.settings.registry.resolve(&self.settings.precache)?;

        let mut seen = BTreeSet::new();
        let locators: Vec<String> = self
            .settings
            .manifest
            .iter()
            .map(|l| self.canonical(l))
            .filter(|l| seen.insert(l.clone()))
            .collect();

        info!(
            "Handling install for {}. Resources to precache: {:?}",
            cache_name, locators
        );

        let cache = self.storage.open(&cache_name).await?;
        let entries = try_join_all(locators.iter().map(|l| self.precache_one(l))).await?;
        let stored = entries.len();
        cache.put_all(entries).await?;

        self.host.skip_waiting().await?;

        info!("Precached {} resource(s) into {}", stored, cache_name);
        Ok(InstallReport { cache_name, stored })
    }

    fn canonical(&self, locator: &str) -> String {
        canonical_url(self.settings.origin.as_deref(), locator)
    }

    async fn precache_one(&self, locator: &str) -> ReadThroughResult<(Request, Response)> {
        let request = Request::get(locator);
        let response = self
            .fetcher
            .fetch(request.clone())
            .await
            .map_err(|e| ReadThroughError::precache_fetch(locator, e))?;

        if !response.is_ok() {
            return Err(ReadThroughError::precache_fetch(
                locator,
                format!("unexpected status {}", response.status),
            ));
        }

        Ok((request, response))
    }

    /// Delete every cache the registry no longer references, then claim
    /// clients.
    pub async fn activate(&self) -> ReadThroughResult<ActivateReport> {
        let expected = self.settings.registry.expected_names();

        let existing = self.storage.keys().await.map_err(|e| match e {
            ReadThroughError::CacheEnumeration(_) => e,
            other => ReadThroughError::CacheEnumeration(other.to_string()),
        })?;

        let (kept, stale): (Vec<String>, Vec<String>) =
            existing.into_iter().partition(|name| expected.contains(name));

        try_join_all(stale.iter().map(|name| self.delete_stale(name))).await?;

        self.host.claim_clients().await?;

        info!(
            "Activated version {}: kept {:?}, deleted {:?}",
            self.settings.registry.version(),
            kept,
            stale
        );
        Ok(ActivateReport {
            kept,
            deleted: stale,
        })
    }

    async fn delete_stale(&self, name: &str) -> ReadThroughResult<()> {
        info!("Deleting out of date cache: {}", name);
        self.storage
            .delete(name)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                ReadThroughError::CacheDeletion { .. } => e,
                other => ReadThroughError::CacheDeletion {
                    name: name.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    /// Answer a request from the current cache, falling back to the network.
    ///
    /// HTTP error statuses are returned as responses. Lookup and network
    /// failures are logged and propagated.
    pub async fn serve(&self, request: &Request) -> ReadThroughResult<Served> {
        debug!("Handling fetch for {}", request.url);

        let request = Request {
            url: self.canonical(&request.url),
            ..request.clone()
        };
        self.serve_inner(&request).await.inspect_err(|e| {
            error!("Read-through caching failed for {}: {}", request.url, e);
        })
    }

    async fn serve_inner(&self, request: &Request) -> ReadThroughResult<Served> {
        let cache_name = self.settings.registry.resolve(READ_THROUGH)?;
        let cache = self.storage.open(&cache_name).await?;

        if let Some(response) = cache.lookup(request).await? {
            debug!("Found response for {} in {}", request.url, cache_name);
            return Ok(Served {
                response,
                source: ResponseSource::Cache,
            });
        }

        debug!(
            "No response for {} found in cache. Fetching from network",
            request.url
        );
        let response = self.fetcher.fetch(request.clone()).await?;
        debug!("Response for {} from network: {}", request.url, response.status);

        if self.settings.fill_on_miss && request.is_get() && response.is_ok() {
            if let Err(e) = cache.put(request, response.clone()).await {
                warn!("Failed to store {} in {}: {}", request.url, cache_name, e);
            }
        }

        Ok(Served {
            response,
            source: ResponseSource::Network,
        })
    }
}
