//! Upstream repository access.
//!
//! One fetch is one attempt against one upstream. The outcome is a typed
//! result instead of an error to be matched on: a transient failure of one
//! mirror (`UpstreamFailed`) is an expected branch of the fallback loop,
//! while `Rejected` means something is wrong with the request itself and no
//! other mirror would do better.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};
use tokio::time::Instant;

use super::{CacheError, CacheKey};
use crate::config::UpstreamTimeouts;

/// Body of an upstream response
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// A successful upstream response that has not been read yet
pub struct UpstreamResponse {
    content_length: Option<u64>,
    body: ByteStream,
}

impl UpstreamResponse {
    pub fn new(content_length: Option<u64>, body: ByteStream) -> Self {
        Self {
            content_length,
            body,
        }
    }

    /// Response with a fully buffered body and matching declared length
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let length = data.len() as u64;
        Self::new(Some(length), Box::pin(stream::once(async move { Ok(data) })))
    }

    /// Declared length. When present, exactly this many bytes are taken
    /// from the body.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn into_body(self) -> ByteStream {
        self.body
    }
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Why a single upstream could not provide an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// The upstream answered with a non-success status
    Status(u16),
    /// Timeout, refused connection, broken transfer and the like
    Unreachable(String),
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamFailure::Status(status) => write!(f, "status {}", status),
            UpstreamFailure::Unreachable(reason) => write!(f, "unreachable: {}", reason),
        }
    }
}

/// Result of one attempt against one upstream
#[derive(Debug)]
pub enum FetchOutcome {
    Success(UpstreamResponse),
    UpstreamFailed(UpstreamFailure),
    Rejected(String),
}

/// Source of upstream responses
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    async fn fetch(&self, server: &str, key: &CacheKey) -> FetchOutcome;
}

/// How a client error affects the fallback loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Only this upstream failed; try the next one
    Transient,
    /// The request cannot succeed anywhere
    Fatal,
}

/// Explicit mapping from client error kinds to fallback behavior.
///
/// Only a request that could not be built is fatal. Timeouts, refused
/// connections, redirect loops and broken transfers all happened while
/// talking to one particular mirror.
pub fn classify(err: &reqwest::Error) -> FailureClass {
    if err.is_builder() {
        FailureClass::Fatal
    } else {
        FailureClass::Transient
    }
}

/// URL of `key` on `server`. Each key segment is percent-encoded.
pub fn upstream_url(server: &str, key: &CacheKey) -> String {
    let path = key
        .segments()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", server.trim_end_matches('/'), path)
}

/// HTTP(S) upstream access over a shared connection pool
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    request_timeout: Duration,
    read_timeout: Duration,
    transfer_timeout: Duration,
}

impl HttpUpstream {
    pub fn new(timeouts: UpstreamTimeouts) -> Result<Self, CacheError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("mirror-cache/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            request_timeout: timeouts.request,
            read_timeout: timeouts.read,
            transfer_timeout: timeouts.transfer,
        })
    }

    /// Turn a response into a chunk stream that fails if the upstream goes
    /// quiet for longer than the read timeout, or is still sending at
    /// `deadline`.
    fn body_stream(&self, response: reqwest::Response, deadline: Instant) -> ByteStream {
        let read_timeout = self.read_timeout;
        let transfer_timeout = self.transfer_timeout;
        let chunks = stream::unfold(Some(response), move |state| async move {
            let mut response = state?;
            let chunk_deadline = (Instant::now() + read_timeout).min(deadline);
            match tokio::time::timeout_at(chunk_deadline, response.chunk()).await {
                Ok(Ok(Some(chunk))) => Some((Ok(chunk), Some(response))),
                Ok(Ok(None)) => None,
                Ok(Err(e)) => Some((Err(io::Error::new(io::ErrorKind::Other, e)), None)),
                Err(_) => {
                    let reason = if chunk_deadline == deadline {
                        format!("transfer not finished within {}ms", transfer_timeout.as_millis())
                    } else {
                        format!("no data for {}ms", read_timeout.as_millis())
                    };
                    Some((Err(io::Error::new(io::ErrorKind::TimedOut, reason)), None))
                }
            }
        });
        Box::pin(chunks)
    }
}

#[async_trait]
impl UpstreamFetcher for HttpUpstream {
    async fn fetch(&self, server: &str, key: &CacheKey) -> FetchOutcome {
        let url = upstream_url(server, key);
        let deadline = Instant::now() + self.transfer_timeout;
        let headers_deadline = (Instant::now() + self.request_timeout).min(deadline);
        let send = self.client.get(&url).send();
        let response = match tokio::time::timeout_at(headers_deadline, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return match classify(&e) {
                    FailureClass::Transient => {
                        FetchOutcome::UpstreamFailed(UpstreamFailure::Unreachable(e.to_string()))
                    }
                    FailureClass::Fatal => FetchOutcome::Rejected(e.to_string()),
                };
            }
            Err(_) => {
                return FetchOutcome::UpstreamFailed(UpstreamFailure::Unreachable(format!(
                    "no response within {}ms",
                    self.request_timeout.min(self.transfer_timeout).as_millis()
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::UpstreamFailed(UpstreamFailure::Status(status.as_u16()));
        }

        let content_length = response.content_length();
        FetchOutcome::Success(UpstreamResponse::new(
            content_length,
            self.body_stream(response, deadline),
        ))
    }
}
