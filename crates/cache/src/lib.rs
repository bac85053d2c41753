//! Durable local cache of the last synchronised bundle.
//!
//! The cache holds exactly one *generation*: the complete set of files that
//! was unpacked from one version of the remote bundle, together with a small
//! META table recording which version that was (`versionTag`) and roughly how
//! large it is (`totalBytes`). A new generation replaces the old one in a
//! single transaction; the two are never merged.
//!
//! Durable storage is optional. When it cannot be opened,
//! [`UnavailableStore`] stands in and every operation becomes a no-op.

mod db;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod sqlite;
mod store;
mod unavailable;

pub use crate::db::Database;
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockStore;
pub use crate::sqlite::SqliteStore;
pub use crate::store::{CacheStore, CachedFile, FileStream, TOTAL_BYTES, VERSION_TAG};
pub use crate::unavailable::UnavailableStore;
use std::path::Path;
use std::sync::Arc;

pub type StoreHandle = Arc<dyn CacheStore + Send + Sync>;

/// Open the SQLite cache at `path`, or fall back to [`UnavailableStore`].
///
/// `None` means caching is disabled. Failing to open the database is not an
/// error: the session continues without durable storage.
pub async fn open(path: Option<&Path>) -> StoreHandle {
    let Some(path) = path else {
        tracing::info!("cache disabled; bundle will be downloaded every time");
        return Arc::new(UnavailableStore);
    };
    if let Some(parent) = path.parent()
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        tracing::warn!(path = %parent.display(), error = %err, "could not create cache directory");
    }
    match SqliteStore::connect(path).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = ?err, "cache unavailable; continuing without it");
            Arc::new(UnavailableStore)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_disabled() {
        assert!(!open(None).await.is_available());
    }

    #[tokio::test]
    async fn test_open_unwritable_path_falls_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let store = open(Some(temp_dir.path())).await;
        assert!(!store.is_available());
    }

    #[tokio::test]
    async fn test_open_creates_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open(Some(&temp_dir.path().join("cache.sqlite"))).await;
        assert!(store.is_available());
    }
}
