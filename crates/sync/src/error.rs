//! Sync Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. The underlying crate error is kept
//! as the child of each of these.

use derive_more::{Display, Error};

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bundle could not be downloaded.
    #[display("could not download the bundle")]
    Network,
    /// The downloaded bundle is corrupt or unsafe to unpack.
    #[display("could not unpack the bundle")]
    Archive,
    /// The local cache failed.
    #[display("local cache failed")]
    Store,
    /// The target filesystem refused a write.
    #[display("could not write to the target filesystem")]
    Target,
}

impl ErrorKind {
    /// Returns `true` if calling `sync()` again might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Store)
    }
}
