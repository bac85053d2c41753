use crate::error::Result;
use assetsync_progress::ProgressBus;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

pub type EntryStream<'a> = Pin<Box<dyn Stream<Item = Result<ArchiveEntry>> + Send + 'a>>;

/// A single file unpacked from an archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Slash-delimited path relative to the archive root.
    pub path: String,
    pub data: Vec<u8>,
}
impl ArchiveEntry {
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

/// Turns an in-memory archive into a stream of file entries.
///
/// # Contract
/// - Entries are produced strictly one after another; the next entry is not
///   decompressed until the consumer polls for it.
/// - Directory-only entries are skipped.
/// - Exactly one `unzip-start` is published before the first entry and
///   exactly one `unzip-done` after the last, with `unzip-progress` events
///   in between whose `loadedBytes` never decreases.
/// - The first error ends the stream.
pub trait ArchiveExpander: Send + Sync {
    fn expand<'a>(&'a self, archive: Bytes, bus: &'a ProgressBus) -> EntryStream<'a>;
}
