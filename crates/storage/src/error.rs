//! Errors raised by the target filesystem.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The path, or the parent directory of a file being written, is missing.
    #[display("no such file or directory: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// `chdir` into a file, or a file used as a parent directory.
    #[display("not a directory: {}", _0.display())]
    NotADirectory(#[error(not(source))] PathBuf),
    /// A file write aimed at an existing directory.
    #[display("is a directory: {}", _0.display())]
    IsADirectory(#[error(not(source))] PathBuf),
    /// Empty, contains a NUL byte, or climbs out of the root.
    #[display("invalid target path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The target refused the write for its own reasons (quota, injected fault).
    #[display("write rejected: {_0}")]
    Rejected(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if writing the same path again might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Rejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path() {
        let err = ErrorKind::NotFound(PathBuf::from("rodir/valve"));
        assert_eq!(err.to_string(), "no such file or directory: rodir/valve");
        assert!(!err.is_retryable());
        assert!(ErrorKind::Rejected("quota".into()).is_retryable());
    }
}
