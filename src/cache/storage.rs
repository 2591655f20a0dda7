//! Cache storage abstraction
//!
//! Mirrors the platform cache API: a storage holds named caches, and each
//! cache maps request identity to a stored response.

use crate::error::ReadThroughResult;
use crate::http::{Request, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// A single named cache
#[async_trait]
pub trait Cache: Send + Sync {
    /// Physical name of this cache
    fn name(&self) -> &str;

    /// Look up a stored response by request identity
    async fn lookup(&self, request: &Request) -> ReadThroughResult<Option<Response>>;

    /// Store a response, replacing any previous entry for the same identity
    async fn put(&self, request: &Request, response: Response) -> ReadThroughResult<()>;

    /// Store a batch of responses. Either every entry is committed or none is.
    async fn put_all(&self, entries: Vec<(Request, Response)>) -> ReadThroughResult<()>;

    /// Requests currently stored in this cache
    async fn entries(&self) -> ReadThroughResult<Vec<Request>>;
}

/// Collection of named caches
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a cache, creating it if absent
    async fn open(&self, name: &str) -> ReadThroughResult<Arc<dyn Cache>>;

    /// Names of every cache that currently exists
    async fn keys(&self) -> ReadThroughResult<Vec<String>>;

    /// Delete a cache. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> ReadThroughResult<bool>;
}
