//! readthrough - versioned read-through HTTP response cache
//!
//! Precaches a fixed manifest on install, purges caches of other versions
//! on activate, and serves requests from cache before falling back to the
//! network.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod fetch;
pub mod http;
pub mod lifecycle;
pub mod manager;
pub mod ui;

pub use error::{ReadThroughError, ReadThroughResult};
pub use manager::{CacheSettings, ReadThroughCache, ResponseSource, Served};
