//! Content handed back to callers of the cache engine.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;

use crate::constants::READ_CHUNK_SIZE;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const HTML: &str = "text/html; charset=utf-8";

#[derive(Debug)]
enum Body {
    File(tokio::fs::File),
    Generated(Option<Bytes>),
}

/// A readable entry plus its declared length.
///
/// Files carry their size; generated listings carry no length.
#[derive(Debug)]
pub struct CachedContent {
    content_length: Option<u64>,
    content_type: &'static str,
    body: Body,
}

impl CachedContent {
    pub fn file(file: tokio::fs::File, length: u64) -> Self {
        Self {
            content_length: Some(length),
            content_type: OCTET_STREAM,
            body: Body::File(file),
        }
    }

    pub fn listing(html: String) -> Self {
        Self {
            content_length: None,
            content_type: HTML,
            body: Body::Generated(Some(Bytes::from(html))),
        }
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn is_listing(&self) -> bool {
        matches!(self.body, Body::Generated(_))
    }

    /// Next chunk of the body, or `None` once it is exhausted
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        match &mut self.body {
            Body::File(file) => {
                let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
                let read = file.read_buf(&mut buf).await?;
                Ok((read > 0).then(|| buf.freeze()))
            }
            Body::Generated(bytes) => Ok(bytes.take().filter(|b| !b.is_empty())),
        }
    }

    /// Drain the whole body into memory
    pub async fn read_to_end(mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }
}
