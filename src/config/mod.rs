//! Configuration file handling
//!
//! The file is optional and every field has a default. A file that parses
//! but fails cross-field validation is rejected on load and never written.

pub mod schema;

pub use schema::{Config, StorageBackend};

use crate::error::{ReadThroughError, ReadThroughResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Reads and writes the configuration file at one path
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Use `explicit` when given, otherwise `~/.config/readthrough/config.toml`
    pub fn locate(explicit: Option<PathBuf>) -> Self {
        let path = explicit.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("readthrough")
                .join("config.toml")
        });
        Self { path }
    }

    /// Where disk caches and worker state live unless `storage.dir` is set
    pub fn default_storage_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("readthrough")
            .join("caches")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the file, or the defaults when there is none
    pub async fn load(&self) -> ReadThroughResult<Config> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(ReadThroughError::io(
                    format!("reading config from {}", self.path.display()),
                    e,
                ))
            }
        };

        let config: Config = toml::from_str(&content).map_err(|e| self.invalid(e.to_string()))?;
        config.cache.validate().map_err(|reason| self.invalid(reason))?;
        Ok(config)
    }

    /// Validate and write `config`, creating the parent directory
    pub async fn save(&self, config: &Config) -> ReadThroughResult<()> {
        config.cache.validate().map_err(|reason| self.invalid(reason))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ReadThroughError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        fs::write(&self.path, toml::to_string_pretty(config)?)
            .await
            .map_err(|e| {
                ReadThroughError::io(format!("writing config to {}", self.path.display()), e)
            })?;

        info!("Configuration saved to {}", self.path.display());
        Ok(())
    }

    fn invalid(&self, reason: String) -> ReadThroughError {
        ReadThroughError::ConfigInvalid {
            path: self.path.clone(),
            reason,
        }
    }
}
