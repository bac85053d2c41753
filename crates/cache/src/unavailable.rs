use crate::CacheStore;
use crate::error::Result;
use crate::store::{CachedFile, FileStream};
use async_trait::async_trait;

/// The store used when no durable storage exists.
///
/// Reads find nothing and writes are discarded, so a sync against it always
/// downloads and never persists.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

#[async_trait]
impl CacheStore for UnavailableStore {
    fn is_available(&self) -> bool {
        false
    }

    async fn get_file(&self, _path: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set_file(&self, _path: &str, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn get_meta(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set_meta(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn remove_meta(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn clear_files(&self) -> Result<()> {
        Ok(())
    }

    async fn put_many(&self, _entries: &[CachedFile]) -> Result<u64> {
        Ok(0)
    }

    async fn replace_files(&self, _entries: &[CachedFile]) -> Result<u64> {
        Ok(0)
    }

    fn iterate<'a>(&'a self) -> FileStream<'a> {
        Box::pin(futures::stream::empty())
    }

    async fn stored_bytes(&self) -> Result<u64> {
        Ok(0)
    }
}
