//! S3-compatible backend built on an OpenDAL operator.
//!
//! Retries are not configured on the operator; they are applied uniformly by
//! `RetryingObjectStore` so every backend follows the same policy.

use super::{ObjectStore, ObjectStoreError, ObjectStoreResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use opendal::Operator;
use std::fmt;

/// Connection settings for an S3-compatible bucket.
#[derive(Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Refuse plaintext `http://` endpoints.
    pub enforce_tls: bool,
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("enforce_tls", &self.enforce_tls)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    op: Operator,
}

impl S3ObjectStore {
    /// Build an operator using path-style addressing, which works with AWS
    /// as well as MinIO, SeaweedFS and B2's S3 gateway.
    pub fn connect(settings: &S3Settings) -> Result<Self> {
        if settings.endpoint.starts_with("http://") {
            if settings.enforce_tls {
                anyhow::bail!(
                    "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled",
                    settings.endpoint
                );
            }
            tracing::warn!(
                endpoint = %settings.endpoint,
                "S3 endpoint uses plaintext HTTP; ciphertext and credentials travel unencrypted"
            );
        }

        let builder = opendal::services::S3::default()
            .endpoint(&settings.endpoint)
            .region(&settings.region)
            .bucket(&settings.bucket)
            .access_key_id(&settings.access_key_id)
            .secret_access_key(&settings.secret_access_key);

        let op = Operator::new(builder)
            .context("creating OpenDAL S3 operator")?
            .layer(opendal::layers::LoggingLayer::default())
            .finish();

        Ok(Self { op })
    }
}

fn map_err(name: &str, err: opendal::Error) -> ObjectStoreError {
    if err.kind() == opendal::ErrorKind::NotFound {
        ObjectStoreError::NotFound(name.to_string())
    } else if err.is_temporary() {
        ObjectStoreError::Transient(err.to_string())
    } else {
        ObjectStoreError::Permanent(err.to_string())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> ObjectStoreResult<()> {
        if name.is_empty() || name.ends_with('/') {
            return Err(ObjectStoreError::InvalidName);
        }
        self.op
            .write(name, bytes.to_vec())
            .await
            .map(|_| ())
            .map_err(|e| map_err(name, e))
    }

    async fn get(&self, name: &str) -> ObjectStoreResult<Vec<u8>> {
        let buffer = self.op.read(name).await.map_err(|e| map_err(name, e))?;
        Ok(buffer.to_vec())
    }

    async fn delete(&self, name: &str) -> ObjectStoreResult<()> {
        self.op.delete(name).await.map_err(|e| map_err(name, e))
    }

    async fn check(&self) -> ObjectStoreResult<()> {
        self.op
            .list("/")
            .await
            .map(|_| ())
            .map_err(|e| map_err("/", e))
    }
}
