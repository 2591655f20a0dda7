//! Configuration schema for readthrough
//!
//! Configuration is stored at `~/.config/readthrough/config.toml`

use crate::cache::{CacheRegistry, CacheVersion, READ_THROUGH};
use crate::config::ConfigManager;
use crate::manager::CacheSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache version, registry and manifest
    pub cache: CacheConfig,

    /// Network fetch settings
    pub network: NetworkConfig,

    /// Storage backend settings
    pub storage: StorageConfig,
}

impl Config {
    /// Build the immutable settings consumed by the cache manager
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            registry: self.cache.registry(),
            precache: self.cache.precache.clone(),
            manifest: self.cache.manifest.clone(),
            fill_on_miss: self.cache.fill_on_miss,
            origin: self.network.origin.clone(),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache generation. Increment to purge every cache on next activation.
    pub version: u32,

    /// Logical cache that install populates
    pub precache: String,

    /// Resources fetched and stored at install time
    pub manifest: Vec<String>,

    /// Store network responses on a cache miss
    pub fill_on_miss: bool,

    /// Logical name -> cache base name
    pub registry: BTreeMap<String, String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let mut registry = BTreeMap::new();
        registry.insert(READ_THROUGH.to_string(), "read-through-cache".to_string());

        Self {
            version: 1,
            precache: READ_THROUGH.to_string(),
            manifest: vec!["styles/main.css".to_string()],
            fill_on_miss: true,
            registry,
        }
    }
}

impl CacheConfig {
    /// Check cross-field constraints. Returns a reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if !self.registry.contains_key(READ_THROUGH) {
            return Err(format!(
                "cache.registry must contain the \"{}\" logical name",
                READ_THROUGH
            ));
        }
        if !self.registry.contains_key(&self.precache) {
            return Err(format!(
                "cache.precache \"{}\" is not in cache.registry",
                self.precache
            ));
        }
        if let Some((logical, _)) = self.registry.iter().find(|(_, base)| base.trim().is_empty()) {
            return Err(format!("cache.registry entry \"{}\" has an empty base name", logical));
        }
        Ok(())
    }

    /// Registry of physical cache names for the configured version
    pub fn registry(&self) -> CacheRegistry {
        CacheRegistry::new(CacheVersion(self.version), self.registry.clone())
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Base URL that relative locators resolve against
    pub origin: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header sent with every fetch
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: None,
            timeout_secs: 30,
            user_agent: format!("readthrough/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One directory per cache on the local filesystem
    Disk,
    /// In-process only, discarded on exit
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use
    pub backend: StorageBackend,

    /// Cache directory (defaults to `<state dir>/caches`)
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Directory holding one subdirectory per cache
    pub fn root(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(ConfigManager::default_storage_dir)
    }

    /// Worker state file, kept beside the caches it describes
    pub fn worker_state_path(&self) -> PathBuf {
        self.root().join(".worker.json")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Disk,
            dir: None,
        }
    }
}
