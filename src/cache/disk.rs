//! Filesystem-backed cache storage
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<cache-name>/.readthrough-cache     marks the directory as a cache
//! <root>/<cache-name>/<sha256(key)>.entry    metadata line, then the body
//! ```
//!
//! An entry is a single line of compact JSON followed by the raw response
//! body. Entries are written to a staging file and renamed into place, so a
//! reader sees the old entry or the new one, never a mix. Directories
//! without the marker are not caches and are never listed or deleted.

use crate::cache::storage::{Cache, CacheStorage};
use crate::error::{ReadThroughError, ReadThroughResult};
use crate::http::{Request, Response};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const ENTRY_EXT: &str = "entry";
const BACKUP_EXT: &str = "bak";
const MARKER: &str = ".readthrough-cache";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Metadata line stored ahead of each body
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    request: Request,
    response: Response,
    stored_at: DateTime<Utc>,
}

/// Hash a cache key into a file stem
fn entry_stem(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// A staging path unique within this process and across processes
fn staging_path(target: &Path) -> PathBuf {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = OsString::from(target.as_os_str());
    name.push(format!(".{}-{}.tmp", std::process::id(), seq));
    PathBuf::from(name)
}

fn encode_entry(request: &Request, response: &Response) -> ReadThroughResult<Vec<u8>> {
    let meta = StoredEntry {
        request: request.clone(),
        response: response.clone(),
        stored_at: Utc::now(),
    };
    // Compact JSON escapes control characters, so the first newline ends it
    let mut bytes = serde_json::to_vec(&meta)?;
    bytes.push(b'\n');
    bytes.extend_from_slice(&response.body);
    Ok(bytes)
}

fn decode_entry(bytes: &[u8]) -> Result<(StoredEntry, &[u8]), String> {
    let split = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| "entry has no metadata line".to_string())?;
    let meta = serde_json::from_slice(&bytes[..split]).map_err(|e| e.to_string())?;
    Ok((meta, &bytes[split + 1..]))
}

/// Reject names that would escape the storage root
fn validate_cache_name(name: &str) -> ReadThroughResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.starts_with('.');
    if invalid {
        return Err(ReadThroughError::CacheOpen {
            name: name.to_string(),
            reason: "cache names must be non-empty and contain no path separators".to_string(),
        });
    }
    Ok(())
}

async fn remove_quietly<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        let _ = fs::remove_file(path).await;
    }
}

/// An entry moved into place, with the copy of what it replaced
struct Committed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

/// A cache stored as a directory of entry files
#[derive(Debug)]
pub struct DiskCache {
    name: String,
    dir: PathBuf,
}

impl DiskCache {
    fn entry_path(&self, request: &Request) -> PathBuf {
        self.dir
            .join(format!("{}.{}", entry_stem(&request.cache_key()), ENTRY_EXT))
    }

    fn write_err(&self, e: impl ToString) -> ReadThroughError {
        ReadThroughError::CacheWrite {
            name: self.name.clone(),
            reason: e.to_string(),
        }
    }

    fn lookup_err(&self, e: impl ToString) -> ReadThroughError {
        ReadThroughError::CacheLookup {
            name: self.name.clone(),
            reason: e.to_string(),
        }
    }

    /// Write an entry to a fresh staging file. Returns (staged, target).
    async fn stage(
        &self,
        request: &Request,
        response: &Response,
    ) -> ReadThroughResult<(PathBuf, PathBuf)> {
        let target = self.entry_path(request);
        let staged = staging_path(&target);
        let bytes = encode_entry(request, response)?;

        if let Err(e) = fs::write(&staged, bytes).await {
            let _ = fs::remove_file(&staged).await;
            return Err(self.write_err(e));
        }
        Ok((staged, target))
    }

    /// Move a staged entry over its target, keeping a hard link to the
    /// previous entry so it can be restored.
    async fn commit(&self, staged: &Path, target: &Path) -> ReadThroughResult<Committed> {
        let backup_path = target.with_extension(BACKUP_EXT);
        let _ = fs::remove_file(&backup_path).await;

        let backup = match fs::hard_link(target, &backup_path).await {
            Ok(()) => Some(backup_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(self.write_err(e)),
        };

        if let Err(e) = fs::rename(staged, target).await {
            remove_quietly(&backup).await;
            return Err(self.write_err(e));
        }

        Ok(Committed {
            target: target.to_path_buf(),
            backup,
        })
    }

    /// Put every committed target back the way it was
    async fn roll_back(&self, committed: &[Committed]) {
        for entry in committed.iter().rev() {
            match &entry.backup {
                Some(backup) => {
                    let _ = fs::rename(backup, &entry.target).await;
                }
                None => {
                    let _ = fs::remove_file(&entry.target).await;
                }
            }
        }
    }

    /// Read only the metadata line of an entry file
    async fn read_request(&self, path: &Path) -> ReadThroughResult<Request> {
        let file = fs::File::open(path).await.map_err(|e| self.lookup_err(e))?;
        let mut line = Vec::new();
        BufReader::new(file)
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| self.lookup_err(e))?;

        let meta: StoredEntry =
            serde_json::from_slice(line.strip_suffix(b"\n").unwrap_or(&line))
                .map_err(|e| self.lookup_err(e))?;
        Ok(meta.request)
    }
}

#[async_trait]
impl Cache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, request: &Request) -> ReadThroughResult<Option<Response>> {
        let bytes = match fs::read(self.entry_path(request)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.lookup_err(e)),
        };

        let (meta, body) = decode_entry(&bytes).map_err(|e| self.lookup_err(e))?;
        let mut response = meta.response;
        response.body = body.to_vec();
        Ok(Some(response))
    }

    async fn put(&self, request: &Request, response: Response) -> ReadThroughResult<()> {
        let (staged, target) = self.stage(request, &response).await?;
        if let Err(e) = fs::rename(&staged, &target).await {
            let _ = fs::remove_file(&staged).await;
            return Err(self.write_err(e));
        }
        debug!("Stored {} in {}", request, self.name);
        Ok(())
    }

    async fn put_all(&self, batch: Vec<(Request, Response)>) -> ReadThroughResult<()> {
        // Last write per key wins
        let mut seen = HashSet::new();
        let mut unique: Vec<&(Request, Response)> = batch
            .iter()
            .rev()
            .filter(|(request, _)| seen.insert(request.cache_key()))
            .collect();
        unique.reverse();

        let mut staged = Vec::with_capacity(unique.len());
        for (request, response) in unique {
            match self.stage(request, response).await {
                Ok(pair) => staged.push(pair),
                Err(e) => {
                    remove_quietly(staged.iter().map(|(s, _)| s).collect::<Vec<_>>()).await;
                    return Err(e);
                }
            }
        }

        let mut committed = Vec::with_capacity(staged.len());
        for (i, (staged_path, target)) in staged.iter().enumerate() {
            match self.commit(staged_path, target).await {
                Ok(entry) => committed.push(entry),
                Err(e) => {
                    self.roll_back(&committed).await;
                    remove_quietly(staged[i..].iter().map(|(s, _)| s).collect::<Vec<_>>()).await;
                    return Err(e);
                }
            }
        }

        remove_quietly(committed.iter().filter_map(|c| c.backup.as_ref()).collect::<Vec<_>>()).await;
        debug!("Stored {} entries in {}", committed.len(), self.name);
        Ok(())
    }

    async fn entries(&self) -> ReadThroughResult<Vec<Request>> {
        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| self.lookup_err(e))?;

        let mut requests = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| self.lookup_err(e))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXT) {
                requests.push(self.read_request(&path).await?);
            }
        }

        requests.sort_by_key(|r| r.cache_key());
        Ok(requests)
    }
}

/// Cache storage rooted at a directory, one subdirectory per cache
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Create a storage rooted at `root` (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn is_cache_dir(dir: &Path) -> std::io::Result<bool> {
        fs::try_exists(dir.join(MARKER)).await
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> ReadThroughResult<Arc<dyn Cache>> {
        validate_cache_name(name)?;
        let dir = self.root.join(name);
        let open_err = |e: std::io::Error| ReadThroughError::CacheOpen {
            name: name.to_string(),
            reason: e.to_string(),
        };

        fs::create_dir_all(&dir).await.map_err(open_err)?;
        if !Self::is_cache_dir(&dir).await.map_err(open_err)? {
            fs::write(dir.join(MARKER), name).await.map_err(open_err)?;
        }

        Ok(Arc::new(DiskCache {
            name: name.to_string(),
            dir,
        }))
    }

    async fn keys(&self) -> ReadThroughResult<Vec<String>> {
        let enumeration_err = |e: std::io::Error| ReadThroughError::CacheEnumeration(e.to_string());

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(enumeration_err(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(enumeration_err)? {
            if !entry.file_type().await.map_err(enumeration_err)?.is_dir() {
                continue;
            }
            if !Self::is_cache_dir(&entry.path()).await.map_err(enumeration_err)? {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> ReadThroughResult<bool> {
        let deletion_err = |reason: String| ReadThroughError::CacheDeletion {
            name: name.to_string(),
            reason,
        };
        validate_cache_name(name).map_err(|e| deletion_err(e.to_string()))?;

        let dir = self.root.join(name);
        if !Self::is_cache_dir(&dir)
            .await
            .map_err(|e| deletion_err(e.to_string()))?
        {
            return Ok(false);
        }

        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(deletion_err(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage() -> (DiskStorage, TempDir) {
        let temp = TempDir::new().unwrap();
        (DiskStorage::new(temp.path().join("caches")), temp)
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut files = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        files.sort();
        files
    }

    #[tokio::test]
    async fn keys_empty_when_root_missing() {
        let (storage, _temp) = test_storage();
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_and_lookup_roundtrip() {
        let (storage, _temp) = test_storage();
        let cache = storage.open("read-through-cache-v1").await.unwrap();

        let response = Response::new(200, "body { color: red }\n/* two lines */")
            .with_header("content-type", "text/css");
        cache
            .put(&Request::get("/styles/main.css"), response.clone())
            .await
            .unwrap();

        let found = cache
            .lookup(&Request::get("/styles/main.css"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, response);
    }

    #[tokio::test]
    async fn put_replaces_entry_whole() {
        let (storage, _temp) = test_storage();
        let cache = storage.open("c-v1").await.unwrap();
        let request = Request::get("/logo.png");

        cache
            .put(&request, Response::new(200, "old").with_header("etag", "\"1\""))
            .await
            .unwrap();
        cache
            .put(&request, Response::new(203, "new").with_header("etag", "\"2\""))
            .await
            .unwrap();

        let found = cache.lookup(&request).await.unwrap().unwrap();
        assert_eq!(found.status, 203);
        assert_eq!(found.body, b"new");
        assert_eq!(found.headers.get("etag"), Some(&"\"2\"".to_string()));
    }

    #[tokio::test]
    async fn lookup_missing_returns_none() {
        let (storage, _temp) = test_storage();
        let cache = storage.open("c-v1").await.unwrap();
        assert!(cache.lookup(&Request::get("/nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_all_leaves_no_staging_files() {
        let (storage, temp) = test_storage();
        let cache = storage.open("c-v1").await.unwrap();
        cache
            .put_all(vec![
                (Request::get("/a"), Response::new(200, "a")),
                (Request::get("/b"), Response::new(200, "b")),
                (Request::get("/a"), Response::new(200, "a2")),
            ])
            .await
            .unwrap();

        let files = file_names(&temp.path().join("caches").join("c-v1"));
        assert_eq!(files.len(), 3);
        assert!(files.contains(&MARKER.to_string()));
        assert!(files.iter().all(|f| !f.ends_with(".tmp") && !f.ends_with(".bak")));

        assert_eq!(cache.entries().await.unwrap().len(), 2);
        let a = cache.lookup(&Request::get("/a")).await.unwrap().unwrap();
        assert_eq!(a.body, b"a2");
    }

    #[tokio::test]
    async fn failed_put_all_restores_previous_entries() {
        let (storage, temp) = test_storage();
        let cache = storage.open("c-v1").await.unwrap();
        cache
            .put(&Request::get("/a"), Response::new(200, "original"))
            .await
            .unwrap();

        // A directory where /b's entry belongs makes its commit fail
        let dir = temp.path().join("caches").join("c-v1");
        let blocked = dir.join(format!("{}.{}", entry_stem("GET /b"), ENTRY_EXT));
        std::fs::create_dir(&blocked).unwrap();

        let result = cache
            .put_all(vec![
                (Request::get("/a"), Response::new(200, "replacement")),
                (Request::get("/b"), Response::new(200, "b")),
            ])
            .await;
        assert!(matches!(result, Err(ReadThroughError::CacheWrite { .. })));

        let a = cache.lookup(&Request::get("/a")).await.unwrap().unwrap();
        assert_eq!(a.body, b"original");

        std::fs::remove_dir(&blocked).unwrap();
        let files = file_names(&dir);
        assert!(files.iter().all(|f| !f.ends_with(".tmp") && !f.ends_with(".bak")));
    }

    #[tokio::test]
    async fn delete_removes_directory() {
        let (storage, _temp) = test_storage();
        storage.open("c-v0").await.unwrap();
        storage.open("c-v1").await.unwrap();

        assert!(storage.delete("c-v0").await.unwrap());
        assert!(!storage.delete("c-v0").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["c-v1".to_string()]);
    }

    #[tokio::test]
    async fn unmarked_directories_are_left_alone() {
        let (storage, temp) = test_storage();
        let root = temp.path().join("caches");
        std::fs::create_dir_all(root.join("photos")).unwrap();
        std::fs::write(root.join("photos").join("cat.jpg"), "meow").unwrap();
        storage.open("c-v1").await.unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["c-v1".to_string()]);
        assert!(!storage.delete("photos").await.unwrap());
        assert!(root.join("photos").join("cat.jpg").exists());
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let (storage, _temp) = test_storage();
        assert!(storage.open("../escape").await.is_err());
        assert!(storage.open("").await.is_err());
        assert!(storage.delete("a/b").await.is_err());
    }
}
