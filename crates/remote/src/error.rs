//! Remote Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A remote error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for remote operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request could not be sent or no response arrived.
    #[display("request failed: {_0}")]
    Request(#[error(not(source))] String),
    /// The server answered with a non-success status.
    #[display("unexpected HTTP status {_0}")]
    Status(#[error(not(source))] u16),
    /// The response body broke off or could not be decoded.
    #[display("response body failed: {_0}")]
    Body(#[error(not(source))] String),
    /// The transfer was cancelled by the caller.
    #[display("download aborted")]
    Aborted,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Body(_) => true,
            Self::Status(code) => *code == 408 || *code == 429 || *code >= 500,
            Self::Aborted => false,
        }
    }
}
