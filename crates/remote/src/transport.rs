use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Cache validators advertised for a resource, from a `HEAD` request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Probe {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Response body of a `GET`.
pub enum Body {
    /// The transport only hands over the body once it is complete.
    Buffered(Bytes),
    /// Chunks as they arrive from the network.
    Streamed(ByteStream),
}
impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

#[derive(Debug)]
pub struct Response {
    /// Declared `Content-Length`, if any.
    pub content_length: Option<u64>,
    pub body: Body,
}

/// The network surface the sync pipeline needs.
///
/// Every request bypasses intermediate caches (`Cache-Control: no-cache`)
/// so that a changed bundle is noticed straight away. A non-success status
/// is an error.
#[async_trait]
pub trait Remote: Send + Sync {
    /// `HEAD` the resource and report its validators.
    async fn probe(&self, url: &str) -> Result<Probe>;

    /// `GET` a small text resource.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// `GET` a resource, handing back the body without reading it.
    async fn fetch(&self, url: &str) -> Result<Response>;
}
