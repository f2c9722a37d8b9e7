// Request pipeline module - per-request context carried through the proxy hooks

use std::time::{Duration, Instant};
use uuid::Uuid;

/// Request context that holds what the proxy learns about one HTTP request
/// between `request_filter` and `logging`
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    started: Instant,
    bytes_sent: u64,
}

impl RequestContext {
    /// Create a new RequestContext
    /// Automatically generates a unique request ID (UUID v4) and captures the start time
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path,
            started: Instant::now(),
            bytes_sent: 0,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_method(&mut self, method: String) {
        self.method = method;
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: String) {
        self.path = path;
    }

    /// Body bytes written to the client so far
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn add_bytes_sent(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("GET".to_string(), "/".to_string())
    }
}
