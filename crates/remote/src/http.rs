//! HTTP transport backed by `reqwest`.

use crate::error::{ErrorKind, Result};
use crate::transport::{Body, Probe, Remote, Response};
use async_trait::async_trait;
use exn::ResultExt;
use futures::StreamExt;
use reqwest::header::{CACHE_CONTROL, ETAG, HeaderMap, HeaderValue, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use std::time::Duration;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// [`Remote`] over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
}
impl HttpRemote {
    /// Build a client that revalidates every request with the origin.
    ///
    /// `connect_timeout` bounds connection setup only; a large bundle may
    /// legitimately take a long time to arrive.
    pub fn new(connect_timeout: Option<Duration>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let mut builder = Client::builder().user_agent(USER_AGENT).default_headers(headers);
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .or_raise(|| ErrorKind::Request("could not build HTTP client".to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client. Default headers are the caller's
    /// responsibility.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn check(status: StatusCode) -> Result<()> {
        match status.is_success() {
            true => Ok(()),
            false => exn::bail!(ErrorKind::Status(status.as_u16())),
        }
    }

    fn header(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
        headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
    }
}

#[async_trait]
impl Remote for HttpRemote {
    #[tracing::instrument(skip(self))]
    async fn probe(&self, url: &str) -> Result<Probe> {
        let response = self.client.head(url).send().await.map_err(|e| ErrorKind::Request(e.to_string()))?;
        Self::check(response.status())?;
        let headers = response.headers();
        Ok(Probe { etag: Self::header(headers, ETAG), last_modified: Self::header(headers, LAST_MODIFIED) })
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.map_err(|e| ErrorKind::Request(e.to_string()))?;
        Self::check(response.status())?;
        Ok(response.text().await.map_err(|e| ErrorKind::Body(e.to_string()))?)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await.map_err(|e| ErrorKind::Request(e.to_string()))?;
        Self::check(response.status())?;
        let content_length = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| exn::Exn::from(ErrorKind::Body(e.to_string()))));
        Ok(Response { content_length, body: Body::Streamed(Box::pin(stream)) })
    }
}
