//! Key record store, kept apart from the file catalog.

use crate::{
    models::key_record::KeyRecord,
    services::{RecordError, RecordResult},
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Persistence contract for [`KeyRecord`]s.
///
/// At most one record exists per (owner, file); a second insert fails with
/// `RecordError::Duplicate`. Inserting for an unknown file fails with
/// `RecordError::DanglingReference`.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn insert(&self, record: &KeyRecord) -> RecordResult<()>;

    async fn find_by_owner_and_file(
        &self,
        owner_id: &str,
        file_id: Uuid,
    ) -> RecordResult<Option<KeyRecord>>;
}

/// SQLite-backed key store over the `encryption_keys` table.
#[derive(Clone)]
pub struct SqliteKeyStore {
    db: Arc<SqlitePool>,
}

impl SqliteKeyStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn insert(&self, record: &KeyRecord) -> RecordResult<()> {
        sqlx::query(
            "INSERT INTO encryption_keys (owner_id, file_id, key_material, iv)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.owner_id)
        .bind(record.file_id)
        .bind(record.key_material.as_bytes().as_slice())
        .bind(record.iv.as_bytes().as_slice())
        .execute(&*self.db)
        .await
        .map_err(RecordError::from_sqlx)?;
        Ok(())
    }

    async fn find_by_owner_and_file(
        &self,
        owner_id: &str,
        file_id: Uuid,
    ) -> RecordResult<Option<KeyRecord>> {
        let record = sqlx::query_as::<_, KeyRecord>(
            "SELECT owner_id, file_id, key_material, iv
             FROM encryption_keys WHERE owner_id = ? AND file_id = ?",
        )
        .bind(owner_id)
        .bind(file_id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }
}
