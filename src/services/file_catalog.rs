//! File catalog: identity and metadata of stored files, no key material.

use crate::{
    models::file_record::FileRecord,
    services::{RecordError, RecordResult},
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Persistence contract for [`FileRecord`]s.
///
/// Implementations must offer read-your-writes consistency within a process.
#[async_trait]
pub trait FileCatalog: Send + Sync {
    /// Insert a new record. `RecordError::Duplicate` if the id or the
    /// stored object name is already taken.
    async fn insert(&self, record: &FileRecord) -> RecordResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RecordResult<Option<FileRecord>>;

    /// Newest first.
    async fn list_by_owner(&self, owner_id: &str) -> RecordResult<Vec<FileRecord>>;

    /// Remove a record; only used to compensate a failed upload.
    /// Returns whether a row was deleted.
    async fn remove(&self, id: Uuid) -> RecordResult<bool>;
}

/// SQLite-backed catalog over the `files` table.
#[derive(Clone)]
pub struct SqliteFileCatalog {
    db: Arc<SqlitePool>,
}

impl SqliteFileCatalog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FileCatalog for SqliteFileCatalog {
    async fn insert(&self, record: &FileRecord) -> RecordResult<()> {
        sqlx::query(
            "INSERT INTO files (
                id, owner_id, logical_name, stored_object_name,
                size_bytes, content_type, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.owner_id)
        .bind(&record.logical_name)
        .bind(&record.stored_object_name)
        .bind(record.size_bytes)
        .bind(&record.content_type)
        .bind(record.created_at)
        .execute(&*self.db)
        .await
        .map_err(RecordError::from_sqlx)?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RecordResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT id, owner_id, logical_name, stored_object_name,
                    size_bytes, content_type, created_at
             FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn list_by_owner(&self, owner_id: &str) -> RecordResult<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            "SELECT id, owner_id, logical_name, stored_object_name,
                    size_bytes, content_type, created_at
             FROM files WHERE owner_id = ?
             ORDER BY created_at DESC, id ASC",
        )
        .bind(owner_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(records)
    }

    async fn remove(&self, id: Uuid) -> RecordResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
