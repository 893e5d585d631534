//! Encrypted file vault.
//!
//! Files are encrypted with a caller-supplied AES-128 key before they reach
//! the object store; metadata and key material are persisted separately in
//! SQLite. Downloads only succeed for the owner who presents the same key.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use crate::{
    config::{AppConfig, ObjectBackend},
    middleware::auth::AuthGate,
    services::{
        file_catalog::SqliteFileCatalog,
        key_store::SqliteKeyStore,
        object_store::{
            FsObjectStore, MemoryObjectStore, ObjectStore, RetryingObjectStore, S3ObjectStore,
        },
        vault_service::VaultService,
    },
    state::AppState,
};
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Construct the configured object store, wrapped in the retry policy.
pub fn build_object_store(cfg: &AppConfig) -> Result<Arc<dyn ObjectStore>> {
    let backend: Arc<dyn ObjectStore> = match cfg.object_backend {
        ObjectBackend::Fs => Arc::new(FsObjectStore::new(&cfg.storage_dir)),
        ObjectBackend::S3 => Arc::new(S3ObjectStore::connect(&cfg.s3)?),
        ObjectBackend::Memory => {
            tracing::warn!("memory object backend selected; ciphertext is lost on restart");
            Arc::new(MemoryObjectStore::new())
        }
    };
    Ok(Arc::new(RetryingObjectStore::new(backend, cfg.retry_policy())))
}

/// Wire the stores, vault and auth gate into handler state.
pub fn build_state(db: Arc<SqlitePool>, objects: Arc<dyn ObjectStore>, jwt_secret: &[u8]) -> AppState {
    let vault = VaultService::new(
        Arc::new(SqliteFileCatalog::new(db.clone())),
        Arc::new(SqliteKeyStore::new(db.clone())),
        objects,
    );
    AppState {
        vault,
        auth: AuthGate::new(jwt_secret),
        db,
    }
}
