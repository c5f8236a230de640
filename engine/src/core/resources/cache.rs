//! Key/value caches
//!
//! Persistent string storage used for raw caption text (`srt_{url}`) and the
//! saved reader state. Caches are best-effort: a failed write is logged and
//! never reaches the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::core::fs::atomic_write_json_pretty;

// =============================================================================
// Cache Trait
// =============================================================================

/// String key/value storage
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str);

    async fn remove(&self, key: &str);
}

// =============================================================================
// Memory Cache
// =============================================================================

/// Process-local cache, lost on exit
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

// =============================================================================
// JSON File Cache
// =============================================================================

/// Cache persisted as a single JSON object, rewritten atomically on change.
///
/// The file is written on the blocking pool from a snapshot, so readers are
/// never held up by disk I/O. `write_lock` keeps writes in mutation order.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
    write_lock: Mutex<()>,
}

impl JsonFileCache {
    /// Default file name inside the cache directory
    pub const FILE_NAME: &'static str = "cache.json";

    /// Opens the cache at `path`. A missing or corrupt file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!("Failed to read cache file {}: {}", path.display(), e);
                HashMap::new()
            }
        };

        debug!(entries = entries.len(), "Opened cache {}", path.display());
        Self {
            path,
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens `cache.json` inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::open(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, snapshot: HashMap<String, String>) {
        let path = self.path.clone();
        let result =
            tokio::task::spawn_blocking(move || atomic_write_json_pretty(&path, &snapshot)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to persist cache {}: {}", self.path.display(), e),
            Err(e) => warn!("Cache write task failed for {}: {}", self.path.display(), e),
        }
    }
}

#[async_trait]
impl KeyValueCache for JsonFileCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        let _write = self.write_lock.lock().await;
        let snapshot = {
            let mut entries = self.entries.write().await;
            if entries.get(key).map(String::as_str) == Some(value) {
                return;
            }
            entries.insert(key.to_string(), value.to_string());
            entries.clone()
        };
        self.persist(snapshot).await;
    }

    async fn remove(&self, key: &str) {
        let _write = self.write_lock.lock().await;
        let snapshot = {
            let mut entries = self.entries.write().await;
            if entries.remove(key).is_none() {
                return;
            }
            entries.clone()
        };
        self.persist(snapshot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_cache_get_set_remove() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty().await);

        cache.set("srt_a", "content").await;
        assert_eq!(cache.get("srt_a").await.as_deref(), Some("content"));
        assert_eq!(cache.len().await, 1);

        cache.remove("srt_a").await;
        assert_eq!(cache.get("srt_a").await, None);
    }

    #[tokio::test]
    async fn test_json_file_cache_survives_reopen() {
        let dir = TempDir::new().unwrap();

        let cache = JsonFileCache::in_dir(dir.path());
        cache.set("readerState", "{\"lessonId\":\"1\"}").await;
        cache.set("srt_x", "1\n00:00:00,000 --> 00:00:01,000\nhi").await;
        cache.remove("srt_x").await;

        let reopened = JsonFileCache::in_dir(dir.path());
        assert_eq!(
            reopened.get("readerState").await.as_deref(),
            Some("{\"lessonId\":\"1\"}")
        );
        assert_eq!(reopened.get("srt_x").await, None);
    }

    #[tokio::test]
    async fn test_json_file_cache_ignores_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();

        let cache = JsonFileCache::open(&path);
        assert_eq!(cache.get("anything").await, None);

        cache.set("k", "v").await;
        assert_eq!(JsonFileCache::open(&path).get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_json_file_cache_concurrent_writes_keep_final_state() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(JsonFileCache::in_dir(dir.path()));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache.set(&format!("srt_{}", i), &format!("v{}", i)).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        cache.set("readerState", "last").await;

        let reopened = JsonFileCache::in_dir(dir.path());
        for i in 0..16 {
            assert_eq!(
                reopened.get(&format!("srt_{}", i)).await,
                Some(format!("v{}", i))
            );
        }
        assert_eq!(reopened.get("readerState").await.as_deref(), Some("last"));
    }
}
