//! Error types for readthrough
//!
//! All modules use `ReadThroughResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for readthrough operations
pub type ReadThroughResult<T> = Result<T, ReadThroughError>;

/// All errors that can occur in readthrough
#[derive(Error, Debug)]
pub enum ReadThroughError {
    // Install errors
    #[error("Precache fetch failed for {url}: {reason}")]
    PrecacheFetch { url: String, reason: String },

    // Activate errors
    #[error("Failed to enumerate caches: {0}")]
    CacheEnumeration(String),

    #[error("Failed to delete cache {name}: {reason}")]
    CacheDeletion { name: String, reason: String },

    // Cache storage errors
    #[error("Failed to open cache {name}: {reason}")]
    CacheOpen { name: String, reason: String },

    #[error("Cache lookup failed in {name}: {reason}")]
    CacheLookup { name: String, reason: String },

    #[error("Failed to write to cache {name}: {reason}")]
    CacheWrite { name: String, reason: String },

    #[error("No cache registered for logical name: {0}")]
    UnknownLogicalCache(String),

    // Serve errors
    #[error("Network request failed for {url}: {reason}")]
    Network { url: String, reason: String },

    // Lifecycle errors
    #[error("Cannot {operation} while worker is {phase}")]
    InvalidPhase { operation: String, phase: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl ReadThroughError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network failure error
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a precache fetch failure
    pub fn precache_fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::PrecacheFetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PrecacheFetch { .. } => {
                Some("Check that every manifest entry is reachable and returns a 2xx status")
            }
            Self::Network { .. } => Some("Check network connectivity or the configured origin"),
            Self::InvalidPhase { .. } => Some("Run: readthrough up"),
            Self::UnknownLogicalCache(_) => Some("Add the name to [cache.registry] in config.toml"),
            _ => None,
        }
    }
}
