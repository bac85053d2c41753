//! ZIP implementation of [`ArchiveExpander`].

use crate::error::{ErrorKind, Result};
use crate::expander::{ArchiveEntry, ArchiveExpander, EntryStream};
use crate::meter::{ProgressMeter, partial_percent};
use assetsync_progress::{ProgressBus, ProgressEvent};
use async_stream::stream;
use bytes::Bytes;
use exn::ResultExt;
use std::io::{Cursor, Read};
use zip::ZipArchive;

type Archive = ZipArchive<Cursor<Bytes>>;

const LOCAL_HEADER_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
// An archive with no entries is nothing but its end-of-central-directory record.
const EMPTY_ARCHIVE_MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
const READ_CHUNK: usize = 64 * 1024;
// Don't trust a declared size blindly when preallocating.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Check whether `bytes` start with a ZIP signature.
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(&LOCAL_HEADER_MAGIC) || bytes.starts_with(&EMPTY_ARCHIVE_MAGIC)
}

/// A file (not directory) entry discovered in the central directory.
struct Listing {
    index: usize,
    name: String,
    size: u64,
}

/// Expands ZIP archives held in memory.
///
/// # Examples
///
/// ```no_run
/// use assetsync_archive::{ArchiveExpander, ZipExpander};
/// use assetsync_progress::ProgressBus;
/// use futures::TryStreamExt;
///
/// # async fn example(bundle: bytes::Bytes) -> assetsync_archive::error::Result<()> {
/// let bus = ProgressBus::default();
/// let mut entries = ZipExpander.expand(bundle, &bus);
/// while let Some(entry) = entries.try_next().await? {
///     println!("{}: {} bytes", entry.path, entry.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipExpander;

impl ZipExpander {
    fn open(bytes: Bytes) -> Result<Archive> {
        if !is_zip(&bytes) {
            exn::bail!(ErrorKind::NotAnArchive);
        }
        ZipArchive::new(Cursor::new(bytes)).or_raise(|| ErrorKind::InvalidArchive)
    }

    /// Walk the central directory without decompressing anything. Every name
    /// is checked up front so that a hostile archive fails before the first
    /// byte is written anywhere.
    fn list(archive: &mut Archive) -> Result<Vec<Listing>> {
        let mut listing = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).or_raise(|| ErrorKind::InvalidArchive)?;
            if file.is_dir() {
                continue;
            }
            if file.enclosed_name().is_none() {
                exn::bail!(ErrorKind::UnsafePath(file.name().to_string()));
            }
            listing.push(Listing {
                index,
                name: file.name().to_string(),
                size: file.size(),
            });
        }
        Ok(listing)
    }

    /// Decompress one entry, publishing an `unzip-progress` every time its
    /// percentage changes. The closing 100% update is left to the caller.
    fn read(
        archive: &mut Archive,
        listing: &Listing,
        position: usize,
        meter: &ProgressMeter,
        bus: &ProgressBus,
    ) -> Result<ArchiveEntry> {
        let invalid = || ErrorKind::InvalidData(listing.name.clone());
        let mut file = archive.by_index(listing.index).or_raise(invalid)?;
        let mut data = Vec::with_capacity(listing.size.min(MAX_PREALLOCATION) as usize);
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut reported = 0u8;
        loop {
            let read = file.read(&mut chunk).or_raise(invalid)?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
            let percent = partial_percent(data.len() as u64, listing.size);
            if percent > reported {
                reported = percent;
                bus.publish(ProgressEvent::UnzipProgress {
                    file: listing.name.clone(),
                    file_index: position as u64,
                    file_percent: percent,
                    loaded_bytes: meter.position(position, percent),
                    total_bytes: meter.total(),
                });
            }
        }
        Ok(ArchiveEntry::new(listing.name.clone(), data))
    }
}

impl ArchiveExpander for ZipExpander {
    fn expand<'a>(&'a self, archive: Bytes, bus: &'a ProgressBus) -> EntryStream<'a> {
        Box::pin(stream! {
            let mut archive = match Self::open(archive) {
                Ok(archive) => archive,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let listing = match Self::list(&mut archive) {
                Ok(listing) => listing,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let meter = ProgressMeter::new(listing.iter().map(|entry| Some(entry.size)));
            tracing::debug!(files = meter.total_files(), bytes = meter.total_bytes(), "Expanding archive");
            bus.publish(ProgressEvent::UnzipStart {
                total_files: meter.total_files(),
                total_bytes: meter.total_bytes(),
            });

            for (position, entry) in listing.iter().enumerate() {
                // The zip reader borrows the archive and is not `Send`; it
                // must be gone before the next yield point.
                let unpacked = Self::read(&mut archive, entry, position, &meter, bus);
                match unpacked {
                    Ok(unpacked) => {
                        bus.publish(ProgressEvent::UnzipProgress {
                            file: entry.name.clone(),
                            file_index: position as u64,
                            file_percent: 100,
                            loaded_bytes: meter.position(position, 100),
                            total_bytes: meter.total(),
                        });
                        yield Ok(unpacked);
                    },
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                }
            }

            bus.publish(ProgressEvent::UnzipDone {
                total_files: meter.total_files(),
                total_bytes: meter.total_bytes(),
            });
        })
    }
}
