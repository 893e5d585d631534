//! Vault internals: crypto, persistence contracts, object storage and the
//! orchestrating `VaultService`.

use thiserror::Error;

pub mod crypto_engine;
pub mod file_catalog;
pub mod key_store;
pub mod object_store;
pub mod vault_service;

/// Failures of the SQLite-backed record stores.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record already exists")]
    Duplicate,
    #[error("record references a missing file")]
    DanglingReference,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RecordResult<T> = Result<T, RecordError>;

impl RecordError {
    /// Classify a raw sqlx error by constraint violation.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Self::Duplicate,
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Self::DanglingReference
            }
            _ => Self::Sqlx(err),
        }
    }
}
