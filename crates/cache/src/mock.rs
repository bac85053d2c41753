//! In-memory cache store for testing.

use crate::error::{ErrorKind, Result};
use crate::store::{CacheStore, CachedFile, FileStream};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    meta: BTreeMap<String, String>,
    commits: usize,
    fail_commits: bool,
    fail_iterate_after: Option<usize>,
}

/// In-memory cache store with fault injection.
///
/// Transactions are simulated by applying a whole batch under one lock, so a
/// failed commit leaves both tables untouched.
///
/// # Examples
///
/// ```
/// use assetsync_cache::{CacheStore, MockStore, VERSION_TAG};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockStore::with_files([("valve/liblist.gam", b"data")]).with_meta([(VERSION_TAG, "v1")]);
/// assert_eq!(store.version_tag().await?.as_deref(), Some("v1"));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockStore {
    state: Mutex<State>,
}

impl MockStore {
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let store = Self::default();
        store.lock().files.extend(files.into_iter().map(|(path, data)| (path.into(), data.into())));
        store
    }

    pub fn with_meta(self, meta: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        self.lock().meta.extend(meta.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    /// Make every `put_many`/`replace_files` fail without changing anything.
    pub fn fail_commits(self) -> Self {
        self.lock().fail_commits = true;
        self
    }

    /// Make `iterate` fail after yielding `n` entries.
    pub fn fail_iterate_after(self, n: usize) -> Self {
        self.lock().fail_iterate_after = Some(n);
        self
    }

    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        self.lock().files.clone()
    }

    pub fn meta(&self) -> BTreeMap<String, String> {
        self.lock().meta.clone()
    }

    /// Number of successful `put_many`/`replace_files` calls.
    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn commit(&mut self, entries: &[CachedFile], clear: bool) -> Result<u64> {
        if self.fail_commits {
            exn::bail!(ErrorKind::Database);
        }
        if clear {
            self.files.clear();
        }
        let mut written = 0;
        for entry in entries {
            self.files.insert(entry.path.clone(), entry.data.clone());
            written += entry.len();
        }
        self.commits += 1;
        Ok(written)
    }
}

#[async_trait]
impl CacheStore for MockStore {
    fn is_available(&self) -> bool {
        true
    }

    async fn get_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().files.get(path).cloned())
    }

    async fn set_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.lock().files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().meta.get(key).cloned())
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.lock().meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_meta(&self, key: &str) -> Result<()> {
        self.lock().meta.remove(key);
        Ok(())
    }

    async fn clear_files(&self) -> Result<()> {
        self.lock().files.clear();
        Ok(())
    }

    async fn put_many(&self, entries: &[CachedFile]) -> Result<u64> {
        self.lock().commit(entries, false)
    }

    async fn replace_files(&self, entries: &[CachedFile]) -> Result<u64> {
        self.lock().commit(entries, true)
    }

    fn iterate<'a>(&'a self) -> FileStream<'a> {
        // Snapshot under the lock, then drop it before yielding.
        let (files, fail_after) = {
            let state = self.lock();
            let files: Vec<CachedFile> =
                state.files.iter().map(|(path, data)| CachedFile::new(path.clone(), data.clone())).collect();
            (files, state.fail_iterate_after)
        };
        Box::pin(stream! {
            for (index, file) in files.into_iter().enumerate() {
                if fail_after.is_some_and(|limit| index >= limit) {
                    yield Err(exn::Exn::from(ErrorKind::Database));
                    return;
                }
                yield Ok(file);
            }
        })
    }

    async fn stored_bytes(&self) -> Result<u64> {
        Ok(self.lock().files.values().map(|data| data.len() as u64).sum())
    }
}
