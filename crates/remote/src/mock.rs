//! Canned-response transport for testing.

use crate::error::{ErrorKind, Result};
use crate::transport::{Body, ByteStream, Probe, Remote, Response};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockMethod {
    Head,
    Get,
}

/// What a streamed body does after its last canned chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MockTail {
    #[default]
    End,
    /// The connection breaks.
    Fail,
    /// No further data ever arrives.
    Stall,
}

#[derive(Clone)]
struct MockBody {
    chunks: Vec<Bytes>,
    content_length: Option<u64>,
    buffered: bool,
    tail: MockTail,
}

#[derive(Clone, Default)]
struct Route {
    status: Option<u16>,
    probe: Probe,
    text: Option<String>,
    body: Option<MockBody>,
}

#[derive(Default)]
struct State {
    routes: HashMap<String, Route>,
    requests: Vec<(MockMethod, String)>,
}

/// [`Remote`] serving canned responses and recording every request.
///
/// Unknown URLs answer `404`.
///
/// # Examples
///
/// ```
/// use assetsync_remote::{MockRemote, Remote};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let remote = MockRemote::default().with_etag("valve.zip", "\"v1\"");
/// assert_eq!(remote.probe("valve.zip").await?.etag.as_deref(), Some("\"v1\""));
/// assert_eq!(remote.request_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockRemote {
    state: Mutex<State>,
}

impl MockRemote {
    fn edit(self, url: &str, f: impl FnOnce(&mut Route)) -> Self {
        f(self.lock().routes.entry(url.to_string()).or_default());
        self
    }

    pub fn with_etag(self, url: &str, etag: &str) -> Self {
        self.edit(url, |route| route.probe.etag = Some(etag.to_string()))
    }

    pub fn with_last_modified(self, url: &str, value: &str) -> Self {
        self.edit(url, |route| route.probe.last_modified = Some(value.to_string()))
    }

    pub fn with_text(self, url: &str, text: &str) -> Self {
        self.edit(url, |route| route.text = Some(text.to_string()))
    }

    /// Answer every request for `url` with `status`.
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.edit(url, |route| route.status = Some(status))
    }

    /// Stream `data` in chunks of `chunk_size`, declaring its length.
    pub fn with_body(self, url: &str, data: impl Into<Bytes>, chunk_size: usize) -> Self {
        let data = data.into();
        let chunk_size = chunk_size.max(1);
        let chunks = (0..data.len()).step_by(chunk_size).map(|at| data.slice(at..data.len().min(at + chunk_size)));
        let body = MockBody {
            chunks: chunks.collect(),
            content_length: Some(data.len() as u64),
            buffered: false,
            tail: MockTail::End,
        };
        self.edit(url, |route| route.body = Some(body))
    }

    /// Stream exactly these chunks without declaring a length.
    pub fn with_chunks(self, url: &str, chunks: impl IntoIterator<Item = impl Into<Bytes>>) -> Self {
        let body = MockBody {
            chunks: chunks.into_iter().map(Into::into).collect(),
            content_length: None,
            buffered: false,
            tail: MockTail::End,
        };
        self.edit(url, |route| route.body = Some(body))
    }

    /// Hand over `data` in one piece, as a transport without incremental
    /// body access would.
    pub fn with_buffered(self, url: &str, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let body = MockBody {
            content_length: Some(data.len() as u64),
            chunks: vec![data],
            buffered: true,
            tail: MockTail::End,
        };
        self.edit(url, |route| route.body = Some(body))
    }

    /// Override or remove the declared `Content-Length` of the body.
    pub fn with_content_length(self, url: &str, length: Option<u64>) -> Self {
        self.edit(url, |route| {
            if let Some(body) = route.body.as_mut() {
                body.content_length = length;
            }
        })
    }

    /// Choose what happens after the last chunk of the body.
    pub fn with_tail(self, url: &str, tail: MockTail) -> Self {
        self.edit(url, |route| {
            if let Some(body) = route.body.as_mut() {
                body.tail = tail;
            }
        })
    }

    pub fn requests(&self) -> Vec<(MockMethod, String)> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Number of `GET` requests for `url`.
    pub fn get_count(&self, url: &str) -> usize {
        self.lock().requests.iter().filter(|(method, u)| *method == MockMethod::Get && u == url).count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, method: MockMethod, url: &str) -> Result<Route> {
        let mut state = self.lock();
        state.requests.push((method, url.to_string()));
        let Some(route) = state.routes.get(url).cloned() else {
            exn::bail!(ErrorKind::Status(404));
        };
        if let Some(status) = route.status {
            exn::bail!(ErrorKind::Status(status));
        }
        Ok(route)
    }
}

#[async_trait]
impl Remote for MockRemote {
    async fn probe(&self, url: &str) -> Result<Probe> {
        Ok(self.respond(MockMethod::Head, url)?.probe)
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        match self.respond(MockMethod::Get, url)?.text {
            Some(text) => Ok(text),
            None => exn::bail!(ErrorKind::Status(404)),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Response> {
        let Some(body) = self.respond(MockMethod::Get, url)?.body else {
            exn::bail!(ErrorKind::Status(404));
        };
        if body.buffered {
            let data = body.chunks.concat();
            return Ok(Response { content_length: body.content_length, body: Body::Buffered(Bytes::from(data)) });
        }
        let chunks = futures::stream::iter(body.chunks.into_iter().map(Ok));
        let tail: ByteStream = match body.tail {
            MockTail::End => Box::pin(futures::stream::empty()),
            MockTail::Fail => {
                Box::pin(futures::stream::once(async { Err(exn::Exn::from(ErrorKind::Body("connection reset".into()))) }))
            },
            MockTail::Stall => Box::pin(futures::stream::pending()),
        };
        Ok(Response { content_length: body.content_length, body: Body::Streamed(Box::pin(chunks.chain(tail))) })
    }
}
