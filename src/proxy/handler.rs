//! Mapping between HTTP requests and cache engine calls.
//!
//! Functions here return values instead of writing to the session so the
//! status and body decisions can be tested without a running server. The
//! proxy writes the result.

use crate::cache::{CacheError, CachedContent};

pub const NOT_FOUND_BODY: &str = "No such entry found.";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const ALLOWED_METHODS: &str = "GET, HEAD";

/// A short text response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextResponse {
    /// HTTP status code
    pub status: u16,
    /// Extra headers besides `Server`, `Content-Type` and `Content-Length`
    pub headers: Vec<(&'static str, &'static str)>,
    /// Response body
    pub body: String,
}

impl TextResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(404, NOT_FOUND_BODY)
    }

    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::new(400, reason)
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::new(500, reason)
    }

    pub fn method_not_allowed() -> Self {
        let mut response = Self::new(405, "Method not allowed.");
        response.headers.push(("Allow", ALLOWED_METHODS));
        response
    }
}

/// What to send back for one cache lookup
#[derive(Debug)]
pub enum CacheResponse {
    /// 200 with the entry streamed as the body
    Content(CachedContent),
    Text(TextResponse),
}

impl CacheResponse {
    pub fn status(&self) -> u16 {
        match self {
            CacheResponse::Content(_) => 200,
            CacheResponse::Text(text) => text.status,
        }
    }
}

impl From<Result<Option<CachedContent>, CacheError>> for CacheResponse {
    fn from(result: Result<Option<CachedContent>, CacheError>) -> Self {
        match result {
            Ok(Some(content)) => CacheResponse::Content(content),
            Ok(None) => CacheResponse::Text(TextResponse::not_found()),
            Err(e) if e.is_caller_error() => {
                CacheResponse::Text(TextResponse::bad_request(e.to_string()))
            }
            Err(e) => CacheResponse::Text(TextResponse::internal_error(e.to_string())),
        }
    }
}

/// Turn a request path into an engine key.
///
/// Segments are percent-decoded and joined with `/`; empty segments
/// (including the leading one) are dropped, so `/` maps to the root.
pub fn request_path_to_key(uri_path: &str) -> Result<String, String> {
    let mut segments = Vec::new();
    for segment in uri_path.split('/').filter(|s| !s.is_empty()) {
        let decoded = urlencoding::decode(segment)
            .map_err(|_| format!("Invalid path '{}': not valid UTF-8", uri_path))?;
        segments.push(decoded.into_owned());
    }
    Ok(segments.join("/"))
}
