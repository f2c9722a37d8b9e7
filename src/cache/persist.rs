//! Atomic publication of downloaded entries.
//!
//! The body goes to a temporary file in the staging directory under the
//! cache root and is renamed onto its final path only once complete. A reader therefore either
//! sees no file or the complete file. The temporary file is deleted on every
//! path that does not end in the rename, including early returns and panics,
//! because it is owned by a `TempPath` guard until then.

use std::io;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use super::upstream::{ByteStream, UpstreamResponse};
use crate::constants::STAGING_DIRECTORY;

#[derive(Error, Debug)]
pub enum PersistError {
    /// Reading the upstream body failed; another upstream may still succeed
    #[error("upstream body failed: {0}")]
    Upstream(#[source] io::Error),

    /// The upstream closed the body before the declared length was reached
    #[error("upstream body ended after {actual} of {expected} bytes")]
    Incomplete { expected: u64, actual: u64 },

    /// Local storage failed; retrying against another upstream would not help
    #[error("storage failure: {0}")]
    Storage(#[source] io::Error),
}

impl PersistError {
    /// True when the failure belongs to the upstream, not to local storage
    pub fn is_upstream_failure(&self) -> bool {
        !matches!(self, PersistError::Storage(_))
    }
}

/// Directory under `cache_root` that holds in-progress downloads
pub fn staging_dir(cache_root: &Path) -> PathBuf {
    cache_root.join(STAGING_DIRECTORY)
}

/// Write `response` to `target`, publishing it with a single rename.
///
/// At most the declared content length is copied. Returns the number of bytes
/// published.
pub async fn persist_atomically(
    cache_root: &Path,
    target: &Path,
    response: UpstreamResponse,
) -> Result<u64, PersistError> {
    let staging = staging_dir(cache_root);
    tokio::fs::create_dir_all(&staging)
        .await
        .map_err(PersistError::Storage)?;
    let temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(&staging)
        .map_err(PersistError::Storage)?;
    let (std_file, temp_path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let declared = response.content_length();
    let written = copy_limited(response.into_body(), &mut file, declared).await?;
    if let Some(expected) = declared {
        if written < expected {
            return Err(PersistError::Incomplete {
                expected,
                actual: written,
            });
        }
    }

    file.flush().await.map_err(PersistError::Storage)?;
    file.sync_all().await.map_err(PersistError::Storage)?;
    drop(file);

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(PersistError::Storage)?;
    }
    // rename(2) replaces atomically; on failure the guard inside the error
    // is dropped and removes the temporary file.
    temp_path
        .persist(target)
        .map_err(|e| PersistError::Storage(e.error))?;

    Ok(written)
}

async fn copy_limited(
    mut body: ByteStream,
    file: &mut tokio::fs::File,
    limit: Option<u64>,
) -> Result<u64, PersistError> {
    let mut remaining = limit.unwrap_or(u64::MAX);
    let mut written = 0u64;
    while remaining > 0 {
        let chunk = match body.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return Err(PersistError::Upstream(e)),
            None => break,
        };
        let take = usize::try_from(remaining)
            .map(|remaining| remaining.min(chunk.len()))
            .unwrap_or(chunk.len());
        file.write_all(&chunk[..take])
            .await
            .map_err(PersistError::Storage)?;
        written += take as u64;
        remaining -= take as u64;
    }
    Ok(written)
}
