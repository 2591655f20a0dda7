//! Versioned response caches
//!
//! Every logical cache (e.g. `read-through`) maps to exactly one physical
//! cache per version. Physical names are derived from the logical name and
//! the cache version, so any worker can compute them without coordination.
//!
//! # Cache Lifecycle
//!
//! | Event | Effect |
//! |-------|--------|
//! | Install | Current cache opened, manifest entries stored |
//! | Serve (miss) | Response optionally stored |
//! | Activate | Caches absent from the registry deleted |

pub mod disk;
pub mod memory;
pub mod registry;
pub mod storage;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;
#[cfg(test)]
pub(crate) use memory::FaultyStorage;
pub use registry::{CacheRegistry, CacheVersion, READ_THROUGH};
pub use storage::{Cache, CacheStorage};
