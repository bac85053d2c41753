//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes do not start with a recognised archive signature.
    #[display("not a supported archive")]
    NotAnArchive,
    /// The archive structure (central directory, headers) is unreadable.
    #[display("invalid or corrupted archive")]
    InvalidArchive,
    /// An entry failed to decompress or its checksum did not match.
    #[display("invalid or corrupted entry: {_0}")]
    InvalidData(#[error(not(source))] String),
    /// An entry name would escape the extraction root.
    #[display("unsafe entry path: {_0}")]
    UnsafePath(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Never, with the same bytes. A fresh download might, which is the
    /// caller's decision.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
