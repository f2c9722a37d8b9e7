//! Cache error types
//!
//! "Not found on any upstream" is not an error: the engine reports it as
//! `Ok(None)`. Everything here is either a caller mistake or a failure the
//! request boundary turns into an error response.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// The requested path cannot be mapped onto the cache root
    #[error("Invalid path '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Writing or publishing a downloaded entry failed on local storage
    #[error("Failed to persist '{}': {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An upstream request failed in a way that is not specific to that upstream
    #[error("Request to '{server}' rejected: {reason}")]
    Upstream { server: String, reason: String },

    /// The task coordinating a download did not run to completion
    #[error("Download of '{key}' aborted: {reason}")]
    CoordinatorFailed { key: String, reason: String },

    /// The upstream HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// True when the request itself was malformed, as opposed to the cache failing
    pub fn is_caller_error(&self) -> bool {
        matches!(self, CacheError::InvalidKey { .. })
    }
}
