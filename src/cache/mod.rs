// Cache module - pull-through storage of upstream repository entries
//
// A request for a key is answered from the cache directory when the entry is
// present. Otherwise exactly one coordinator downloads it from the first
// upstream that has it, while concurrent requests for the same key wait.

pub mod content;
pub mod engine;
pub mod error;
pub mod key;
pub mod listing;
pub mod lock;
pub mod persist;
pub mod upstream;

pub use content::CachedContent;
pub use engine::CacheEngine;
pub use error::CacheError;
pub use key::CacheKey;
pub use lock::{DownloadLock, DownloadLocks, LockAttempt};
pub use upstream::{FetchOutcome, HttpUpstream, UpstreamFailure, UpstreamFetcher, UpstreamResponse};
