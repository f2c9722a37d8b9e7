// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Defaults are written back into the properties file on startup, so the
// values here are what a fresh installation ends up with on disk.

// =============================================================================
// Server defaults
// =============================================================================

/// Default location of the properties file
pub const DEFAULT_CONFIG_LOCATION: &str = "/etc/mirror-cache.properties";

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 5956;

/// Value of the `Server` header on every response
pub const SERVER_NAME: &str = "mirror-cache";

// =============================================================================
// Upstream defaults
// =============================================================================

/// Upstream repositories consulted, in order, when nothing else is configured
pub const DEFAULT_SERVERS: &[&str] = &[
    "https://repo.maven.apache.org/maven2",
    "https://plugins.gradle.org/m2",
];

/// Default time allowed to establish a connection to one upstream
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default time allowed for one upstream to answer with response headers
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Default time allowed between two body chunks from one upstream
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

/// Default time allowed for one whole attempt, headers and body included
pub const DEFAULT_TRANSFER_TIMEOUT_MS: u64 = 120_000;

// =============================================================================
// Cache defaults
// =============================================================================

/// Cache directory name, resolved against the working directory
pub const DEFAULT_CACHE_DIRECTORY: &str = "maven";

/// Hidden directory under the cache root holding in-progress downloads
pub const STAGING_DIRECTORY: &str = ".staging";

/// Chunk size used when streaming cached files to clients
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

// =============================================================================
// Logging defaults
// =============================================================================

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Environment variable selecting the log output format (`json` or `text`)
pub const LOG_FORMAT_ENV: &str = "MIRROR_CACHE_LOG_FORMAT";
