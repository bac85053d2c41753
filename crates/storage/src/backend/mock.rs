//! In-memory target filesystem for testing.

use crate::error::{ErrorKind, Result};
use crate::path::{parent_of, validate as validate_path};
use crate::TargetFs;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct State {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    cwd: PathBuf,
    writes: usize,
    fail_writes_after: Option<usize>,
}

/// In-memory target filesystem for testing.
///
/// Behaves like [`LocalFs`](super::LocalFs): writing a file whose parent
/// directory was never created fails with
/// [`NotFound`](ErrorKind::NotFound), and `chdir` requires an existing
/// directory. The lock is never held across an await point.
///
/// # Examples
///
/// ```
/// use assetsync_storage::backend::{MockFs, TargetFs};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let target = MockFs::default();
/// target.mkdir_tree(Path::new("rodir/valve")).await?;
/// target.write_file(Path::new("rodir/valve/liblist.gam"), b"data").await?;
/// assert_eq!(target.snapshot().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockFs {
    state: Mutex<State>,
}

impl MockFs {
    /// Fail every write after the first `n` successful ones.
    pub fn fail_writes_after(self, n: usize) -> Self {
        self.lock().fail_writes_after = Some(n);
        self
    }

    /// Copy of every file currently stored, keyed by root-relative path.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.lock().files.clone()
    }

    /// Number of successful `write_file` calls so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }
}

#[async_trait]
impl TargetFs for MockFs {
    fn name(&self) -> &str {
        "mock"
    }

    async fn mkdir_tree(&self, path: &Path) -> Result<()> {
        let validated = validate_path(path)?;
        let mut state = self.lock();
        let mut current = PathBuf::new();
        for component in validated.components() {
            current.push(component);
            if state.files.contains_key(&current) {
                exn::bail!(ErrorKind::NotADirectory(current));
            }
            state.dirs.insert(current.clone());
        }
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        let validated = validate_path(path)?;
        let mut state = self.lock();
        if let Some(limit) = state.fail_writes_after
            && state.writes >= limit
        {
            exn::bail!(ErrorKind::Rejected(format!("injected failure writing {}", validated.display())));
        }
        if let Some(parent) = parent_of(&validated)
            && !state.is_dir(&parent)
        {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        if state.is_dir(&validated) {
            exn::bail!(ErrorKind::IsADirectory(validated));
        }
        state.files.insert(validated, data.to_vec());
        state.writes += 1;
        Ok(())
    }

    async fn chdir(&self, path: &Path) -> Result<()> {
        let validated = validate_path(path)?;
        let mut state = self.lock();
        if state.files.contains_key(&validated) {
            exn::bail!(ErrorKind::NotADirectory(path.to_path_buf()));
        }
        if !state.is_dir(&validated) {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        state.cwd = validated;
        Ok(())
    }

    fn cwd(&self) -> PathBuf {
        self.lock().cwd.clone()
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let validated = validate_path(path)?;
        match self.lock().files.get(&validated) {
            Some(data) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let validated = validate_path(path)?;
        let state = self.lock();
        Ok(state.files.contains_key(&validated) || state.is_dir(&validated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_requires_parent() {
        let target = MockFs::default();
        let err = target.write_file(Path::new("a/b.txt"), b"x").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));

        target.mkdir_tree(Path::new("a")).await.unwrap();
        target.write_file(Path::new("a/b.txt"), b"x").await.unwrap();
        // Top-level files need no parent.
        target.write_file(Path::new("/top.txt"), b"y").await.unwrap();

        let snapshot = target.snapshot();
        assert_eq!(snapshot.get(Path::new("a/b.txt")).map(Vec::as_slice), Some(&b"x"[..]));
        assert_eq!(snapshot.get(Path::new("top.txt")).map(Vec::as_slice), Some(&b"y"[..]));
    }

    #[tokio::test]
    async fn test_mkdir_tree_creates_ancestors() {
        let target = MockFs::default();
        target.mkdir_tree(Path::new("a/b/c")).await.unwrap();
        assert!(target.exists(Path::new("a")).await.unwrap());
        assert!(target.exists(Path::new("a/b")).await.unwrap());
        assert!(target.exists(Path::new("a/b/c")).await.unwrap());
    }

    #[tokio::test]
    async fn test_fail_writes_after() {
        let target = MockFs::default().fail_writes_after(1);
        target.write_file(Path::new("one"), b"1").await.unwrap();
        let err = target.write_file(Path::new("two"), b"2").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Rejected(_)));
        assert_eq!(target.write_count(), 1);
    }

    #[tokio::test]
    async fn test_chdir() {
        let target = MockFs::default();
        assert!(target.chdir(Path::new("rodir")).await.is_err());
        target.mkdir_tree(Path::new("rodir")).await.unwrap();
        target.chdir(Path::new("rodir")).await.unwrap();
        assert_eq!(target.cwd(), PathBuf::from("rodir"));
    }
}
