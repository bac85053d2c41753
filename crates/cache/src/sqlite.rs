//! SQLite-backed cache store.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::store::{CacheStore, CachedFile, FileStream};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use futures::TryStreamExt;
use sqlx::SqliteConnection;
use std::path::Path;

#[derive(sqlx::FromRow)]
struct FileRow {
    path: String,
    data: Vec<u8>,
}
impl From<FileRow> for CachedFile {
    fn from(row: FileRow) -> Self {
        Self { path: row.path, data: row.data }
    }
}

/// Cache store persisted in a single SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}
impl From<Database> for SqliteStore {
    fn from(db: Database) -> Self {
        Self { db }
    }
}
impl SqliteStore {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Database::connect(path).await?.into())
    }

    pub async fn connect_in_memory() -> Result<Self> {
        Ok(Database::connect_in_memory().await?.into())
    }

    pub async fn close(&self) {
        self.db.close().await;
    }

    async fn insert_all(conn: &mut SqliteConnection, entries: &[CachedFile]) -> Result<u64> {
        let mut written = 0u64;
        for entry in entries {
            let size = i64::try_from(entry.data.len()).or_raise(|| ErrorKind::InvalidData("file size"))?;
            sqlx::query(include_str!("../queries/upsert_file.sql"))
                .bind(&entry.path)
                .bind(&entry.data)
                .bind(size)
                .execute(&mut *conn)
                .await
                .or_raise(|| ErrorKind::Database)?;
            written += entry.len();
        }
        Ok(written)
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    fn is_available(&self) -> bool {
        !self.db.pool().is_closed()
    }

    async fn get_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(include_str!("../queries/get_file.sql"))
            .bind(path)
            .fetch_optional(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(|(data,)| data))
    }

    async fn set_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let size = i64::try_from(data.len()).or_raise(|| ErrorKind::InvalidData("file size"))?;
        sqlx::query(include_str!("../queries/upsert_file.sql"))
            .bind(path)
            .bind(data)
            .bind(size)
            .execute(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(include_str!("../queries/get_meta.sql"))
            .bind(key)
            .fetch_optional(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(|(value,)| value))
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/upsert_meta.sql"))
            .bind(key)
            .bind(value)
            .execute(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn remove_meta(&self, key: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/remove_meta.sql"))
            .bind(key)
            .execute(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn clear_files(&self) -> Result<()> {
        let mut tx = self.db.pool().begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/clear_files.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn put_many(&self, entries: &[CachedFile]) -> Result<u64> {
        let mut tx = self.db.pool().begin().await.or_raise(|| ErrorKind::Database)?;
        let written = Self::insert_all(&mut *tx, entries).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(written)
    }

    #[tracing::instrument(skip_all, fields(entries = entries.len()))]
    async fn replace_files(&self, entries: &[CachedFile]) -> Result<u64> {
        // Dropping the transaction on any error rolls it back, so the
        // previous generation survives a failed replace.
        let mut tx = self.db.pool().begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/clear_files.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let written = Self::insert_all(&mut *tx, entries).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(bytes = written, "replaced cached generation");
        Ok(written)
    }

    fn iterate<'a>(&'a self) -> FileStream<'a> {
        Box::pin(stream! {
            let mut tx = match self.db.pool().begin().await.or_raise(|| ErrorKind::Database) {
                Ok(tx) => tx,
                Err(e) => { yield Err(e); return; },
            };
            {
                let mut rows = sqlx::query_as::<_, FileRow>(include_str!("../queries/iterate_files.sql")).fetch(&mut *tx);
                loop {
                    match rows.try_next().await.or_raise(|| ErrorKind::Database) {
                        Ok(Some(row)) => yield Ok(CachedFile::from(row)),
                        Ok(None) => break,
                        Err(e) => { yield Err(e); return; },
                    }
                }
            }
            if let Err(e) = tx.commit().await.or_raise(|| ErrorKind::Database) {
                yield Err(e);
            }
        })
    }

    async fn stored_bytes(&self) -> Result<u64> {
        let (total,): (i64,) = sqlx::query_as(include_str!("../queries/stored_bytes.sql"))
            .fetch_one(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(total).or_raise(|| ErrorKind::InvalidData("stored bytes"))
    }
}
