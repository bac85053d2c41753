use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub type FileStream<'a> = Pin<Box<dyn Stream<Item = Result<CachedFile>> + Send + 'a>>;

/// META key holding the validator of the stored generation.
pub const VERSION_TAG: &str = "versionTag";
/// META key holding the advisory byte size of the stored generation.
pub const TOTAL_BYTES: &str = "totalBytes";

/// A single file of a cached generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedFile {
    /// Slash-delimited path relative to the mount directory.
    pub path: String,
    pub data: Vec<u8>,
}
impl CachedFile {
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self { path: path.into(), data: data.into() }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Durable storage for one generation of bundle files plus its metadata.
///
/// Two logical tables: FILES (path to bytes) and META (key to text). Missing
/// keys are `None`, never an error.
///
/// Absence of durable storage is a normal state rather than an error: see
/// [`UnavailableStore`](crate::UnavailableStore), for which
/// [`is_available()`](Self::is_available) is `false` and every operation is a
/// no-op.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn is_available(&self) -> bool;

    async fn get_file(&self, path: &str) -> Result<Option<Vec<u8>>>;

    async fn set_file(&self, path: &str, data: &[u8]) -> Result<()>;

    async fn get_meta(&self, key: &str) -> Result<Option<String>>;

    async fn set_meta(&self, key: &str, value: &str) -> Result<()>;

    async fn remove_meta(&self, key: &str) -> Result<()>;

    /// Remove every FILES entry in one transaction.
    async fn clear_files(&self) -> Result<()>;

    /// Upsert every entry in one transaction and return the number of bytes
    /// written. All or nothing.
    async fn put_many(&self, entries: &[CachedFile]) -> Result<u64>;

    /// Replace the stored generation: clear FILES and insert `entries` in
    /// one transaction. On failure the previous generation is left intact.
    async fn replace_files(&self, entries: &[CachedFile]) -> Result<u64>;

    /// Lazily stream every stored file, in no particular order, from a
    /// single read transaction.
    fn iterate<'a>(&'a self) -> FileStream<'a>;

    /// Sum of the stored file sizes.
    async fn stored_bytes(&self) -> Result<u64>;

    /// Validator of the stored generation, if any.
    async fn version_tag(&self) -> Result<Option<String>> {
        self.get_meta(VERSION_TAG).await
    }

    /// Advisory size of the stored generation, read once.
    ///
    /// Any failure (missing key, unreadable store, unparseable value) is
    /// `None`; the hint only ever scales progress.
    async fn total_bytes_hint(&self) -> Option<u64> {
        match self.get_meta(TOTAL_BYTES).await {
            Ok(value) => value.and_then(|v| v.trim().parse().ok()),
            Err(err) => {
                tracing::debug!(error = %err, "could not read size hint");
                None
            },
        }
    }
}
