//! Content cache shared by fetchers.
//!
//! Keys are article ids (already a stable hash of the canonical URL).
//! Values are either a serialized article or a short-lived fetched-recently
//! marker written when an entry had no usable body. Every cache failure
//! degrades to uncached operation: the ingestor logs a warning and carries
//! on, so an unreachable backend can never change the article set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use talkless_core::{Article, IngestConfig, Result, TalklessError};

/// A cached value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheEntry {
    /// A fully normalized article.
    Article { article: Article },
    /// The entry was seen recently but had nothing worth keeping.
    FetchedRecently,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    stored_at: DateTime<Utc>,
    #[serde(flatten)]
    entry: CacheEntry,
}

/// Key-value content cache with a fixed TTL.
#[async_trait]
pub trait ArticleCache: Send + Sync {
    /// Look up `key`; expired entries read as misses.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store `entry` under `key`.
    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Process-local cache used when no endpoint is configured.
pub struct MemoryCache {
    ttl_secs: u64,
    entries: tokio::sync::RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryCache {
    /// Create an empty in-memory cache with the given TTL.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs,
            entries: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (possibly expired) entries, for tests and reporting.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// `true` when nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn expired(stored_at: DateTime<Utc>, ttl_secs: u64) -> bool {
    Utc::now() - stored_at > ChronoDuration::seconds(ttl_secs as i64)
}

#[async_trait]
impl ArticleCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|stored| {
            if expired(stored.stored_at, self.ttl_secs) {
                None
            } else {
                Some(stored.entry.clone())
            }
        }))
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            StoredEntry {
                stored_at: Utc::now(),
                entry: entry.clone(),
            },
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// File-backed cache rooted at a directory, one JSON file per key.
///
/// Writes go through a temp file and rename so a crashed run never leaves a
/// half-written entry behind.
pub struct FileCache {
    ttl_secs: u64,
    dir: PathBuf,
}

impl FileCache {
    /// Create a file cache rooted at `dir`. Directory creation is
    /// best-effort; if it fails, every operation will fail (and degrade).
    pub fn new(dir: impl Into<PathBuf>, ttl_secs: u64) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "could not create cache directory");
        }
        Self { ttl_secs, dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl ArticleCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TalklessError::Cache(format!("{}: {e}", path.display()))),
        };
        let stored: StoredEntry = serde_json::from_slice(&bytes)
            .map_err(|e| TalklessError::Cache(format!("{}: {e}", path.display())))?;
        if expired(stored.stored_at, self.ttl_secs) {
            return Ok(None);
        }
        Ok(Some(stored.entry))
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let stored = StoredEntry {
            stored_at: Utc::now(),
            entry: entry.clone(),
        };
        let json = serde_json::to_vec(&stored)?;
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| TalklessError::Cache(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| TalklessError::Cache(format!("{}: {e}", path.display())))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Build the cache backend selected by configuration.
///
/// `CACHE_URL` overrides `cache_endpoint`; no endpoint means the in-memory
/// backend. An endpoint that cannot be used still returns a cache — its
/// operations fail and the ingestor degrades per-op.
pub fn build_cache(config: &IngestConfig) -> Arc<dyn ArticleCache> {
    let endpoint = std::env::var("CACHE_URL")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| config.cache_endpoint.clone());

    match endpoint {
        Some(path) => Arc::new(FileCache::new(PathBuf::from(path), config.cache_ttl_secs)),
        None => Arc::new(MemoryCache::new(config.cache_ttl_secs)),
    }
}

/// Unusable roots still return a cache handle; ops degrade at call sites.
pub fn file_cache_at(dir: &Path, ttl_secs: u64) -> Arc<dyn ArticleCache> {
    Arc::new(FileCache::new(dir, ttl_secs))
}
