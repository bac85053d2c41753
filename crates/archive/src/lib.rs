//! Archive expansion with progress metering.
//!
//! The sync pipeline only ever consumes one archive format (ZIP), but it
//! talks to it through the [`ArchiveExpander`] trait so that the pipeline
//! does not care which library does the decompressing.
//!
//! Expansion is sequential: progress must be observed as monotonic, and
//! writing entry N+1 may depend on directories created for entry N.

pub mod error;
mod expander;
mod meter;
mod zipfile;

pub use crate::expander::{ArchiveEntry, ArchiveExpander, EntryStream};
pub use crate::meter::{ProgressMeter, UNKNOWN_SIZE_SCALE};
pub use crate::zipfile::{ZipExpander, is_zip};
