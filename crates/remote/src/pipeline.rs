use crate::RemoteHandle;
use crate::error::{ErrorKind, Result};
use crate::transport::Body;
use assetsync_progress::{ProgressBus, ProgressEvent};
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use std::future::Future;
use tokio_util::sync::CancellationToken;

// Content-Length is only a hint; don't let a bogus one reserve gigabytes.
const MAX_PREALLOCATION: u64 = 256 * 1024 * 1024;

/// Downloads a resource into memory while publishing byte-level progress.
///
/// Publishes `start` (declared length, or `0` when unknown), a `progress`
/// after every non-empty chunk, and `done` with the final count. Any failure
/// publishes `error` instead and nothing partial is returned.
#[derive(Clone)]
pub struct DownloadPipeline {
    remote: RemoteHandle,
    bus: ProgressBus,
    cancel: CancellationToken,
}

impl DownloadPipeline {
    pub fn new(remote: RemoteHandle, bus: ProgressBus) -> Self {
        Self { remote, bus, cancel: CancellationToken::new() }
    }

    /// Abort any in-flight [`fetch()`](Self::fetch) once `token` is
    /// cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        match self.download(url).await {
            Ok(bytes) => {
                tracing::debug!(bytes = bytes.len(), "download complete");
                Ok(bytes)
            },
            Err(err) => {
                self.bus.publish(ProgressEvent::error(url, &*err));
                Err(err)
            },
        }
    }

    async fn download(&self, url: &str) -> Result<Bytes> {
        let response = self.cancellable(self.remote.fetch(url)).await??;
        let total = response.content_length.unwrap_or(0);
        self.bus.publish(ProgressEvent::start(url, total));
        match response.body {
            Body::Buffered(bytes) => {
                let loaded = bytes.len() as u64;
                self.bus.publish(ProgressEvent::progress(url, loaded, total));
                self.bus.publish(ProgressEvent::done(url, loaded, total));
                Ok(bytes)
            },
            Body::Streamed(mut stream) => {
                let mut buffer = BytesMut::with_capacity(total.min(MAX_PREALLOCATION) as usize);
                let mut loaded = 0u64;
                while let Some(chunk) = self.cancellable(stream.try_next()).await?? {
                    if chunk.is_empty() {
                        continue;
                    }
                    loaded += chunk.len() as u64;
                    buffer.extend_from_slice(&chunk);
                    self.bus.publish(ProgressEvent::progress(url, loaded, total));
                }
                self.bus.publish(ProgressEvent::done(url, loaded, total));
                Ok(buffer.freeze())
            },
        }
    }

    async fn cancellable<T>(&self, future: impl Future<Output = T>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => exn::bail!(ErrorKind::Aborted),
            output = future => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockRemote, MockTail};
    use std::sync::{Arc, Mutex};

    const URL: &str = "https://assets.test/valve.zip";

    fn recorded(bus: &ProgressBus) -> Arc<Mutex<Vec<ProgressEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(move |event: &ProgressEvent| sink.lock().unwrap().push(event.clone()));
        events
    }

    fn pipeline(remote: MockRemote) -> (DownloadPipeline, Arc<Mutex<Vec<ProgressEvent>>>) {
        let bus = ProgressBus::default();
        let events = recorded(&bus);
        (DownloadPipeline::new(Arc::new(remote), bus), events)
    }

    #[tokio::test]
    async fn test_streamed_download_with_known_length() {
        let data: Vec<u8> = (0..10u8).collect();
        let (pipeline, events) = pipeline(MockRemote::default().with_body(URL, data.clone(), 4));
        let bytes = pipeline.fetch(URL).await.unwrap();
        assert_eq!(bytes, data);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ProgressEvent::start(URL, 10),
                ProgressEvent::progress(URL, 4, 10),
                ProgressEvent::progress(URL, 8, 10),
                ProgressEvent::progress(URL, 10, 10),
                ProgressEvent::done(URL, 10, 10),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_length_and_empty_chunks() {
        let chunks: Vec<Bytes> = vec![Bytes::from_static(b"abc"), Bytes::new(), Bytes::from_static(b"de")];
        let (pipeline, events) = pipeline(MockRemote::default().with_chunks(URL, chunks));
        let bytes = pipeline.fetch(URL).await.unwrap();
        assert_eq!(&bytes[..], b"abcde");
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ProgressEvent::start(URL, 0),
                ProgressEvent::progress(URL, 3, 0),
                ProgressEvent::progress(URL, 5, 0),
                ProgressEvent::done(URL, 5, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_buffered_body_synthesizes_one_step() {
        let (pipeline, events) = pipeline(MockRemote::default().with_buffered(URL, &b"whole"[..]));
        assert_eq!(&pipeline.fetch(URL).await.unwrap()[..], b"whole");
        assert_eq!(
            *events.lock().unwrap(),
            vec![ProgressEvent::start(URL, 5), ProgressEvent::progress(URL, 5, 5), ProgressEvent::done(URL, 5, 5)]
        );
    }

    #[tokio::test]
    async fn test_broken_stream_emits_error() {
        let remote = MockRemote::default().with_body(URL, vec![1u8; 6], 3).with_tail(URL, MockTail::Fail);
        let (pipeline, events) = pipeline(remote);
        let err = pipeline.fetch(URL).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Body(_)));
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[2], ProgressEvent::progress(URL, 6, 6));
        assert!(matches!(&events[3], ProgressEvent::Error { url, .. } if url == URL));
        assert!(!events.iter().any(|event| matches!(event, ProgressEvent::Done { .. })));
    }

    #[tokio::test]
    async fn test_status_error_emits_error() {
        let (pipeline, events) = pipeline(MockRemote::default().with_status(URL, 500));
        let err = pipeline.fetch(URL).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Status(500));
        assert_eq!(
            *events.lock().unwrap(),
            vec![ProgressEvent::error(URL, "unexpected HTTP status 500")]
        );
    }

    #[tokio::test]
    async fn test_cancellation_mid_stream() {
        let remote = MockRemote::default().with_body(URL, vec![1u8; 4], 2).with_tail(URL, MockTail::Stall);
        let bus = ProgressBus::default();
        let events = recorded(&bus);
        let token = CancellationToken::new();
        let trigger = token.clone();
        // Cancel as soon as all canned data has arrived and the stream stalls.
        bus.subscribe(move |event: &ProgressEvent| {
            if matches!(event, ProgressEvent::Progress { loaded: 4, .. }) {
                trigger.cancel();
            }
        });
        let pipeline = DownloadPipeline::new(Arc::new(remote), bus).with_cancellation(token);
        let err = pipeline.fetch(URL).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Aborted);
        let events = events.lock().unwrap();
        assert!(matches!(events.last(), Some(ProgressEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (pipeline, events) = pipeline(MockRemote::default().with_body(URL, vec![1u8; 4], 2));
        let token = CancellationToken::new();
        token.cancel();
        let pipeline = pipeline.with_cancellation(token);
        let err = pipeline.fetch(URL).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Aborted);
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
