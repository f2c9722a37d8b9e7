// Proxy module - Pingora ProxyHttp implementation
// Answers every request from the cache engine inside request_filter; nothing
// is ever forwarded through Pingora's own upstream path.

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::{ErrorType, Result};
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};

use crate::cache::{CacheEngine, CachedContent};
use crate::constants::SERVER_NAME;
use crate::pipeline::RequestContext;

pub mod handler;

use handler::{request_path_to_key, CacheResponse, TextResponse, TEXT_PLAIN};

/// MirrorCacheProxy implements the Pingora ProxyHttp trait
/// Serves cache entries, filling them from the upstream repositories on demand
pub struct MirrorCacheProxy {
    engine: CacheEngine,
}

impl MirrorCacheProxy {
    pub fn new(engine: CacheEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &CacheEngine {
        &self.engine
    }

    fn response_header(status: u16, content_type: &str) -> Result<ResponseHeader> {
        let mut header = ResponseHeader::build(status, None)?;
        header.insert_header("Server", SERVER_NAME)?;
        header.insert_header("Content-Type", content_type.to_string())?;
        Ok(header)
    }

    async fn write_text(
        session: &mut Session,
        ctx: &mut RequestContext,
        response: TextResponse,
        head_only: bool,
    ) -> Result<()> {
        let mut header = Self::response_header(response.status, TEXT_PLAIN)?;
        header.insert_header("Content-Length", response.body.len().to_string())?;
        for (name, value) in &response.headers {
            header.insert_header(*name, *value)?;
        }

        session
            .write_response_header(Box::new(header), head_only)
            .await?;
        if !head_only {
            ctx.add_bytes_sent(response.body.len());
            session
                .write_response_body(Some(Bytes::from(response.body)), true)
                .await?;
        }
        Ok(())
    }

    /// Stream `content` to the client chunk by chunk
    async fn write_content(
        session: &mut Session,
        ctx: &mut RequestContext,
        mut content: CachedContent,
        head_only: bool,
    ) -> Result<()> {
        let mut header = Self::response_header(200, content.content_type())?;
        match content.content_length() {
            Some(length) => header.insert_header("Content-Length", length.to_string())?,
            None => header.insert_header("Transfer-Encoding", "chunked")?,
        }

        session
            .write_response_header(Box::new(header), head_only)
            .await?;
        if head_only {
            return Ok(());
        }

        loop {
            let chunk = content.next_chunk().await.map_err(|e| {
                pingora_core::Error::because(ErrorType::ReadError, "Failed to read cached entry", e)
            })?;
            match chunk {
                Some(chunk) => {
                    ctx.add_bytes_sent(chunk.len());
                    session.write_response_body(Some(chunk), false).await?;
                }
                None => break,
            }
        }
        session.write_response_body(None, true).await?;
        Ok(())
    }
}

#[async_trait]
impl ProxyHttp for MirrorCacheProxy {
    type CTX = RequestContext;

    /// Create a new request context for each incoming request
    fn new_ctx(&self) -> Self::CTX {
        RequestContext::default()
    }

    /// Never reached: request_filter answers every request
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        tracing::error!(request_id = %ctx.request_id(), "Request escaped request_filter");
        Err(pingora_core::Error::explain(
            ErrorType::InternalError,
            "mirror-cache does not proxy requests",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let method = req.method.clone();
        ctx.set_method(method.to_string());
        ctx.set_path(req.uri.path().to_string());

        let head_only = method == Method::HEAD;
        if method != Method::GET && !head_only {
            tracing::info!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                "Rejecting unsupported method"
            );
            Self::write_text(session, ctx, TextResponse::method_not_allowed(), false).await?;
            return Ok(true);
        }

        let response = match request_path_to_key(ctx.path()) {
            Ok(key) => CacheResponse::from(self.engine.get(&key).await),
            Err(reason) => CacheResponse::Text(TextResponse::bad_request(reason)),
        };

        match response {
            CacheResponse::Content(content) => {
                Self::write_content(session, ctx, content, head_only).await?;
            }
            CacheResponse::Text(text) => {
                if text.status >= 500 {
                    tracing::error!(
                        request_id = %ctx.request_id(),
                        path = %ctx.path(),
                        error = %text.body,
                        "Failed to serve entry"
                    );
                }
                Self::write_text(session, ctx, text, head_only).await?;
            }
        }
        Ok(true)
    }

    async fn logging(
        &self,
        session: &mut Session,
        e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status,
            bytes_sent = ctx.bytes_sent(),
            duration_ms = ctx.elapsed().as_millis() as u64,
            error = ?e.map(|e| e.to_string()),
            "Request completed"
        );
    }
}
