//! Target filesystem trait and implementations.
//!
//! This module defines the [`TargetFs`] trait, the write surface that bundle
//! contents are unpacked into. The sync pipeline only ever creates
//! directories, writes whole files and finally changes into the mount
//! directory.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::LocalFs;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockFs;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// The filesystem that bundle contents are written into.
///
/// # Path Handling
/// All paths are relative to the filesystem root; a leading `/` is accepted
/// and ignored. Implementations validate every path with
/// [`validate_path`](crate::validate_path) so nothing can be written outside
/// the root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use assetsync_storage::{backend::TargetFs, error::Result};
///
/// async fn install(target: &dyn TargetFs) -> Result<()> {
///     target.mkdir_tree(Path::new("rodir/valve")).await?;
///     target.write_file(Path::new("rodir/valve/liblist.gam"), b"game \"Half-Life\"").await?;
///     target.chdir(Path::new("rodir")).await
/// }
/// ```
#[async_trait]
pub trait TargetFs: Send + Sync {
    /// Name of the target, used for logging only.
    fn name(&self) -> &str;

    /// Create a directory and every missing ancestor. Succeeds if the
    /// directory already exists.
    async fn mkdir_tree(&self, path: &Path) -> Result<()>;

    /// Write (or overwrite) a file.
    ///
    /// The parent directory must already exist; callers are expected to
    /// [`mkdir_tree()`](Self::mkdir_tree) first. A missing parent results in
    /// [`NotFound`](crate::error::ErrorKind::NotFound).
    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Make `path` the working directory. The directory must exist.
    async fn chdir(&self, path: &Path) -> Result<()>;

    /// Current working directory, relative to the root. Empty until
    /// [`chdir()`](Self::chdir) has been called.
    fn cwd(&self) -> PathBuf;

    /// Read a whole file.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Check whether a file or directory exists.
    async fn exists(&self, path: &Path) -> Result<bool>;
}
