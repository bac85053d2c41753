//! Local filesystem target.
//!
//! Bundle contents are written beneath a configured root directory using
//! `tokio::fs` for async I/O.

use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::TargetFs;
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::fs;

/// Local filesystem target.
///
/// All paths are relative to the configured root directory. The working
/// directory set by [`chdir()`](TargetFs::chdir) is tracked here rather than
/// changing the process-wide working directory.
///
/// # Examples
///
/// ```no_run
/// use assetsync_storage::backend::LocalFs;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let target = LocalFs::new("local", "/var/lib/assetsync/target")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LocalFs {
    name: String,
    root: PathBuf,
    cwd: Mutex<PathBuf>,
}
impl LocalFs {
    /// Create a new local filesystem target.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::NotADirectory(root));
            }
        } else {
            // Only happens once at startup; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root, cwd: Mutex::new(PathBuf::new()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute_path(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::NotADirectory => ErrorKind::NotADirectory(path.to_path_buf()),
            std::io::ErrorKind::IsADirectory => ErrorKind::IsADirectory(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl TargetFs for LocalFs {
    fn name(&self) -> &str {
        &self.name
    }

    async fn mkdir_tree(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::create_dir_all(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn chdir(&self, path: &Path) -> Result<()> {
        let validated = validate_path(path)?;
        let metadata = fs::metadata(self.root.join(&validated))
            .await
            .map_err(|e| Self::map_io_error(e, path))?;
        if !metadata.is_dir() {
            exn::bail!(ErrorKind::NotADirectory(path.to_path_buf()));
        }
        tracing::debug!(target = %self.name, cwd = %validated.display(), "changed working directory");
        *self.cwd.lock().unwrap_or_else(PoisonError::into_inner) = validated;
        Ok(())
    }

    fn cwd(&self) -> PathBuf {
        self.cwd.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }
}
