//! Blob storage addressed by opaque object names.
//!
//! Backends:
//! - [`fs::FsObjectStore`]: sharded local directory
//! - [`s3::S3ObjectStore`]: any S3-compatible endpoint via OpenDAL
//! - [`memory::MemoryObjectStore`]: process-local, for development and tests
//!
//! [`retry::RetryingObjectStore`] wraps any of them with per-attempt
//! timeouts and bounded retries of transient failures.

use async_trait::async_trait;
use std::{io, time::Duration};
use thiserror::Error;

pub mod fs;
pub mod memory;
pub mod retry;
pub mod s3;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;
pub use retry::{RetryPolicy, RetryingObjectStore};
pub use s3::S3ObjectStore;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object name")]
    InvalidName,
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("transient backend failure: {0}")]
    Transient(String),
    #[error("backend failure: {0}")]
    Permanent(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ObjectStoreError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transient(_) => true,
            Self::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            Self::NotFound(_) | Self::InvalidName | Self::Permanent(_) => false,
        }
    }
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Uniform put/get-by-name interface over a blob backend.
///
/// Names are opaque to the store. Implementations must be safe for
/// concurrent use.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `name`, replacing any previous object.
    async fn put(&self, name: &str, bytes: &[u8]) -> ObjectStoreResult<()>;

    /// `ObjectStoreError::NotFound` if nothing is stored under `name`.
    async fn get(&self, name: &str) -> ObjectStoreResult<Vec<u8>>;

    /// Idempotent: deleting a missing object succeeds.
    async fn delete(&self, name: &str) -> ObjectStoreResult<()>;

    /// Cheap reachability probe for readiness checks.
    async fn check(&self) -> ObjectStoreResult<()>;
}
