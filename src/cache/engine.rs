//! The cache-fill engine.
//!
//! Invariants:
//! - If a cache path exists, it is a complete entry (files are only ever
//!   published by the atomic rename in `persist`).
//! - Else if the lock registry holds a lock for the path, exactly one
//!   coordinator is downloading it. When that lock is released and the path
//!   still does not exist, the download failed and the next contender starts
//!   a fresh attempt.
//! - Otherwise nobody is downloading, and registering a lock is the only way
//!   to become the coordinator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::content::CachedContent;
use super::listing;
use super::lock::{DownloadLock, DownloadLocks, LockAttempt};
use super::persist::{persist_atomically, staging_dir, PersistError};
use super::upstream::{FetchOutcome, HttpUpstream, UpstreamFailure, UpstreamFetcher};
use super::{CacheError, CacheKey};
use crate::config::Config;

/// Pull-through cache over an ordered list of upstream repositories.
///
/// Cloning is cheap; clones share the lock registry and the HTTP client.
#[derive(Clone)]
pub struct CacheEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    servers: Vec<String>,
    cache_root: PathBuf,
    fetcher: Arc<dyn UpstreamFetcher>,
    locks: DownloadLocks,
}

impl CacheEngine {
    /// Create an engine over `cache_root`, creating it and its staging
    /// directory if needed.
    pub fn new(
        servers: Vec<String>,
        cache_root: PathBuf,
        fetcher: Arc<dyn UpstreamFetcher>,
    ) -> Result<Self, CacheError> {
        std::fs::create_dir_all(staging_dir(&cache_root))?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                servers,
                cache_root,
                fetcher,
                locks: DownloadLocks::new(),
            }),
        })
    }

    /// Create an engine talking HTTP to the configured upstreams
    pub fn from_config(config: &Config) -> Result<Self, CacheError> {
        let fetcher = HttpUpstream::new(config.timeouts)?;
        Self::new(
            config.servers.clone(),
            config.cache_directory.clone(),
            Arc::new(fetcher),
        )
    }

    pub fn servers(&self) -> &[String] {
        &self.inner.servers
    }

    pub fn cache_root(&self) -> &Path {
        &self.inner.cache_root
    }

    /// Number of downloads currently being coordinated
    pub fn in_flight_downloads(&self) -> usize {
        self.inner.locks.in_flight_count()
    }

    /// Return the entry for `path`, downloading and persisting it first if
    /// needed. `Ok(None)` means no upstream has it.
    ///
    /// Concurrent calls for the same path share a single download. A caller
    /// that goes away mid-download does not cancel it.
    pub async fn get(&self, path: &str) -> Result<Option<CachedContent>, CacheError> {
        let key = CacheKey::parse(path)?;
        let cache_path = key.resolve(&self.inner.cache_root);
        tracing::info!(key = %key, "Request for entry");

        if !path_exists(&cache_path).await && !self.fill(&key, &cache_path).await? {
            return Ok(None);
        }
        self.open_existing(&key, &cache_path).await.map(Some)
    }

    /// Make sure `cache_path` exists. Returns `false` when every upstream
    /// failed.
    async fn fill(&self, key: &CacheKey, cache_path: &Path) -> Result<bool, CacheError> {
        loop {
            match self.inner.locks.try_acquire(cache_path) {
                LockAttempt::Acquired(lock) => {
                    // The previous coordinator may have published between our
                    // existence check and registering this lock.
                    if path_exists(cache_path).await {
                        return Ok(true);
                    }
                    return self.coordinate(key, lock).await;
                }
                LockAttempt::Busy(waiter) => {
                    tracing::debug!(key = %key, "Waiting for in-flight download");
                    waiter.released().await;
                    if path_exists(cache_path).await {
                        return Ok(true);
                    }
                    tracing::debug!(key = %key, "In-flight download failed, taking over");
                }
            }
        }
    }

    /// Run the download on its own task so it finishes even if the caller is
    /// cancelled. The lock is released only after the entry is persisted.
    async fn coordinate(&self, key: &CacheKey, lock: DownloadLock) -> Result<bool, CacheError> {
        let engine = self.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let stored = engine.download(&task_key, lock.path()).await;
            drop(lock);
            stored
        });

        task.await.map_err(|e| CacheError::CoordinatorFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })?
    }

    /// Try each upstream in order until one provides the entry.
    async fn download(&self, key: &CacheKey, cache_path: &Path) -> Result<bool, CacheError> {
        for server in &self.inner.servers {
            tracing::debug!(key = %key, server = %server, "Trying upstream");
            match self.inner.fetcher.fetch(server, key).await {
                FetchOutcome::Success(response) => {
                    tracing::debug!(
                        key = %key,
                        server = %server,
                        content_length = ?response.content_length(),
                        "Found entry upstream"
                    );
                    match persist_atomically(&self.inner.cache_root, cache_path, response).await {
                        Ok(bytes) => {
                            tracing::info!(key = %key, server = %server, bytes, "Saved entry");
                            return Ok(true);
                        }
                        Err(PersistError::Storage(source)) => {
                            return Err(CacheError::Persist {
                                path: cache_path.to_path_buf(),
                                source,
                            });
                        }
                        Err(e) => {
                            tracing::warn!(
                                key = %key,
                                server = %server,
                                error = %e,
                                "Transfer from upstream failed"
                            );
                        }
                    }
                }
                FetchOutcome::UpstreamFailed(UpstreamFailure::Status(status)) => {
                    tracing::debug!(key = %key, server = %server, status, "Upstream does not have entry");
                }
                FetchOutcome::UpstreamFailed(failure) => {
                    tracing::warn!(
                        key = %key,
                        server = %server,
                        error = %failure,
                        "Failed to connect to upstream"
                    );
                }
                FetchOutcome::Rejected(reason) => {
                    return Err(CacheError::Upstream {
                        server: server.clone(),
                        reason,
                    });
                }
            }
        }
        tracing::info!(key = %key, "Entry not found on any upstream");
        Ok(false)
    }

    async fn open_existing(
        &self,
        key: &CacheKey,
        cache_path: &Path,
    ) -> Result<CachedContent, CacheError> {
        let metadata = tokio::fs::metadata(cache_path).await?;
        if metadata.is_dir() {
            tracing::debug!(key = %key, "Serving directory listing");
            let html = listing::render_listing(cache_path).await?;
            return Ok(CachedContent::listing(html));
        }

        tracing::debug!(key = %key, path = %cache_path.display(), "Serving cached file");
        let file = tokio::fs::File::open(cache_path).await?;
        let length = file.metadata().await?.len();
        Ok(CachedContent::file(file, length))
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}
