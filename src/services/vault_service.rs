//! VaultService: orchestrates encrypted upload and verified download.
//!
//! Upload order: encrypt, put ciphertext, insert `FileRecord`, insert
//! `KeyRecord`. A failure after the object write triggers best-effort
//! compensation (delete the record and/or the object) before the error is
//! returned, so a successful response always implies all three exist.
//!
//! Download order: file lookup, key lookup by (owner, file), constant-time
//! key comparison, object fetch, decrypt. Nothing is fetched from the object
//! store until the caller's key has been checked.

use crate::{
    models::{file_record::FileRecord, key_record::KeyRecord},
    services::{
        RecordError,
        crypto_engine::{self, CryptoError, EncryptionKey},
        file_catalog::FileCatalog,
        key_store::KeyStore,
        object_store::{ObjectStore, ObjectStoreError},
    },
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Coarse error classes; the HTTP layer maps each to a status family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    NotFound,
    Storage,
    Integrity,
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("encryption key must be {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("file {0} not found")]
    FileNotFound(Uuid),
    #[error("caller holds no key for file {0}")]
    Unauthorized(Uuid),
    #[error("supplied key does not match the key on record")]
    WrongKey,
    #[error("ciphertext for file {file_id} missing from object store")]
    ObjectMissing { file_id: Uuid },
    #[error("object store write failed: {0}")]
    StorageWriteFailed(#[source] ObjectStoreError),
    #[error("object store read failed: {0}")]
    StorageReadFailed(#[source] ObjectStoreError),
    #[error("file catalog write failed: {0}")]
    CatalogWriteFailed(#[source] RecordError),
    #[error("key record write failed: {0}")]
    KeyRecordWriteFailed(#[source] RecordError),
    #[error("metadata read failed: {0}")]
    MetadataReadFailed(#[source] RecordError),
    #[error("decryption failed for file {file_id}")]
    DecryptionFailed { file_id: Uuid },
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKeyLength { .. } | Self::MissingField(_) => ErrorKind::Validation,
            Self::Unauthorized(_) | Self::WrongKey => ErrorKind::Auth,
            Self::FileNotFound(_) | Self::ObjectMissing { .. } => ErrorKind::NotFound,
            Self::StorageWriteFailed(_)
            | Self::StorageReadFailed(_)
            | Self::CatalogWriteFailed(_)
            | Self::KeyRecordWriteFailed(_)
            | Self::MetadataReadFailed(_) => ErrorKind::Storage,
            Self::DecryptionFailed { .. } => ErrorKind::Integrity,
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

fn parse_key(raw: &[u8]) -> VaultResult<EncryptionKey> {
    EncryptionKey::from_slice(raw).map_err(|err| match err {
        CryptoError::InvalidKeyLength { expected, got } => {
            VaultError::InvalidKeyLength { expected, got }
        }
        _ => VaultError::InvalidKeyLength {
            expected: crypto_engine::KEY_LEN,
            got: raw.len(),
        },
    })
}

/// Upload input. The handler layer fills it from the multipart body.
pub struct UploadRequest<'a> {
    pub logical_name: &'a str,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
    pub key: &'a [u8],
}

/// A decrypted file ready to be streamed back.
#[derive(Debug)]
pub struct DownloadedFile {
    pub logical_name: String,
    pub content_type: String,
    pub plaintext: Vec<u8>,
}

#[derive(Clone)]
pub struct VaultService {
    catalog: Arc<dyn FileCatalog>,
    keys: Arc<dyn KeyStore>,
    objects: Arc<dyn ObjectStore>,
}

impl VaultService {
    pub fn new(
        catalog: Arc<dyn FileCatalog>,
        keys: Arc<dyn KeyStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            catalog,
            keys,
            objects,
        }
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    /// Encrypt and store a file for `owner_id`. Returns the new file id.
    ///
    /// Validation happens before any cryptographic or storage work.
    pub async fn upload(&self, owner_id: &str, req: UploadRequest<'_>) -> VaultResult<Uuid> {
        let key = parse_key(req.key)?;
        if req.logical_name.trim().is_empty() {
            return Err(VaultError::MissingField("filename"));
        }
        let content_type = req
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        let sealed = crypto_engine::encrypt(req.data, &key);
        let size_bytes = i64::try_from(sealed.ciphertext.len()).unwrap_or(i64::MAX);
        let record = FileRecord::new(owner_id, req.logical_name, content_type, size_bytes);

        if let Err(err) = self
            .objects
            .put(&record.stored_object_name, &sealed.ciphertext)
            .await
        {
            warn!(owner = owner_id, error = %err, "ciphertext upload failed");
            // A timed-out write can still land on the backend afterwards.
            if matches!(err, ObjectStoreError::Timeout(_)) {
                self.discard_object(&record.stored_object_name).await;
            }
            return Err(VaultError::StorageWriteFailed(err));
        }

        if let Err(err) = self.catalog.insert(&record).await {
            error!(
                file_id = %record.id,
                stored_object = %record.stored_object_name,
                error = %err,
                "catalog insert failed after object write"
            );
            self.discard_object(&record.stored_object_name).await;
            return Err(VaultError::CatalogWriteFailed(err));
        }

        let key_record = KeyRecord {
            owner_id: owner_id.to_string(),
            file_id: record.id,
            key_material: key,
            iv: sealed.iv,
        };
        if let Err(err) = self.keys.insert(&key_record).await {
            error!(
                file_id = %record.id,
                error = %err,
                "key record insert failed; rolling back file record"
            );
            if let Err(cleanup) = self.catalog.remove(record.id).await {
                warn!(
                    file_id = %record.id,
                    error = %cleanup,
                    "could not roll back file record"
                );
            }
            self.discard_object(&record.stored_object_name).await;
            return Err(VaultError::KeyRecordWriteFailed(err));
        }

        info!(
            file_id = %record.id,
            owner = owner_id,
            size_bytes = record.size_bytes,
            "file uploaded"
        );
        Ok(record.id)
    }

    /// Verify the caller's key and return the decrypted file.
    pub async fn download(
        &self,
        owner_id: &str,
        file_id: Uuid,
        raw_key: &[u8],
    ) -> VaultResult<DownloadedFile> {
        let supplied = parse_key(raw_key)?;

        let file = self
            .catalog
            .find_by_id(file_id)
            .await
            .map_err(VaultError::MetadataReadFailed)?
            .ok_or(VaultError::FileNotFound(file_id))?;

        let Some(key_record) = self
            .keys
            .find_by_owner_and_file(owner_id, file_id)
            .await
            .map_err(VaultError::MetadataReadFailed)?
        else {
            warn!(file_id = %file_id, owner = owner_id, "download without key record");
            return Err(VaultError::Unauthorized(file_id));
        };

        if !key_record.key_material.matches(&supplied) {
            warn!(file_id = %file_id, owner = owner_id, "download with wrong key");
            return Err(VaultError::WrongKey);
        }

        let ciphertext = match self.objects.get(&file.stored_object_name).await {
            Ok(bytes) => bytes,
            Err(ObjectStoreError::NotFound(_)) => {
                error!(
                    file_id = %file_id,
                    stored_object = %file.stored_object_name,
                    "integrity failure: ciphertext missing for catalogued file"
                );
                return Err(VaultError::ObjectMissing { file_id });
            }
            Err(err) => return Err(VaultError::StorageReadFailed(err)),
        };

        let plaintext = crypto_engine::decrypt(&ciphertext, &key_record.key_material, &key_record.iv)
            .map_err(|err| {
                error!(
                    file_id = %file_id,
                    stored_object = %file.stored_object_name,
                    error = %err,
                    "integrity failure: stored ciphertext does not decrypt under its recorded key"
                );
                VaultError::DecryptionFailed { file_id }
            })?;

        info!(file_id = %file_id, owner = owner_id, "file downloaded");
        Ok(DownloadedFile {
            logical_name: file.logical_name,
            content_type: file.content_type,
            plaintext,
        })
    }

    /// Files owned by `owner_id`, newest first.
    pub async fn list_files(&self, owner_id: &str) -> VaultResult<Vec<FileRecord>> {
        self.catalog
            .list_by_owner(owner_id)
            .await
            .map_err(VaultError::MetadataReadFailed)
    }

    async fn discard_object(&self, name: &str) {
        if let Err(err) = self.objects.delete(name).await {
            warn!(stored_object = name, error = %err, "orphaned object left behind");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        services::{
            RecordResult,
            file_catalog::SqliteFileCatalog,
            key_store::SqliteKeyStore,
            object_store::{MemoryObjectStore, ObjectStoreResult},
        },
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const KEY: &[u8] = b"0123456789abcdef";

    struct Harness {
        vault: VaultService,
        catalog: Arc<SqliteFileCatalog>,
        keys: Arc<SqliteKeyStore>,
        objects: Arc<MemoryObjectStore>,
    }

    async fn harness() -> Harness {
        let pool = Arc::new(db::connect_in_memory().await.unwrap());
        let catalog = Arc::new(SqliteFileCatalog::new(pool.clone()));
        let keys = Arc::new(SqliteKeyStore::new(pool));
        let objects = Arc::new(MemoryObjectStore::new());
        Harness {
            vault: VaultService::new(catalog.clone(), keys.clone(), objects.clone()),
            catalog,
            keys,
            objects,
        }
    }

    fn notes(data: &[u8]) -> UploadRequest<'_> {
        UploadRequest {
            logical_name: "notes.txt",
            content_type: Some("text/plain"),
            data,
            key: KEY,
        }
    }

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let h = harness().await;
        let id = h.vault.upload("alice", notes(b"hello world")).await.unwrap();

        let file = h.vault.download("alice", id, KEY).await.unwrap();
        assert_eq!(file.plaintext, b"hello world");
        assert_eq!(file.logical_name, "notes.txt");
        assert_eq!(file.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_stored_object_is_ciphertext() {
        let h = harness().await;
        let id = h.vault.upload("alice", notes(b"hello world")).await.unwrap();

        let record = h.catalog.find_by_id(id).await.unwrap().unwrap();
        let stored = h.objects.get(&record.stored_object_name).await.unwrap();
        assert_eq!(stored.len(), 16);
        assert_eq!(record.size_bytes, 16);
        assert!(!stored.windows(5).any(|w| w == b"hello"));
    }

    #[tokio::test]
    async fn test_every_upload_gets_key_record() {
        let h = harness().await;
        let id = h.vault.upload("alice", notes(b"x")).await.unwrap();
        let key = h.keys.find_by_owner_and_file("alice", id).await.unwrap().unwrap();
        assert_eq!(key.file_id, id);
    }

    #[tokio::test]
    async fn test_single_byte_key_difference_is_wrong_key() {
        let h = harness().await;
        let id = h.vault.upload("alice", notes(b"hello world")).await.unwrap();

        for i in 0..KEY.len() {
            let mut bad = KEY.to_vec();
            bad[i] ^= 0x01;
            let err = h.vault.download("alice", id, &bad).await.unwrap_err();
            assert!(matches!(err, VaultError::WrongKey), "byte {i}: {err:?}");
        }
        let err = h
            .vault
            .download("alice", id, b"0123456789abcdeX")
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::WrongKey));
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_other_owner_is_unauthorized_even_with_right_key() {
        let h = harness().await;
        let id = h.vault.upload("alice", notes(b"secret")).await.unwrap();

        let err = h.vault.download("mallory", id, KEY).await.unwrap_err();
        assert!(matches!(err, VaultError::Unauthorized(f) if f == id));
    }

    #[tokio::test]
    async fn test_unknown_file_not_found() {
        let h = harness().await;
        let err = h.vault.download("alice", Uuid::new_v4(), KEY).await.unwrap_err();
        assert!(matches!(err, VaultError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_key_length_rejected_before_any_write() {
        let h = harness().await;
        let bad_keys: [&[u8]; 3] = [b"", b"short", b"0123456789abcdef0123456789abcdef"];
        for key in bad_keys {
            let err = h
                .vault
                .upload(
                    "alice",
                    UploadRequest {
                        key,
                        ..notes(b"data")
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, VaultError::InvalidKeyLength { expected: 16, .. }));
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(h.objects.is_empty().await);
        assert!(h.catalog.list_by_owner("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_filename_rejected() {
        let h = harness().await;
        let err = h
            .vault
            .upload(
                "alice",
                UploadRequest {
                    logical_name: "  ",
                    ..notes(b"data")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::MissingField("filename")));
        assert!(h.objects.is_empty().await);
    }

    #[tokio::test]
    async fn test_default_content_type() {
        let h = harness().await;
        let id = h
            .vault
            .upload(
                "alice",
                UploadRequest {
                    content_type: None,
                    ..notes(b"data")
                },
            )
            .await
            .unwrap();
        let file = h.vault.download("alice", id, KEY).await.unwrap();
        assert_eq!(file.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_same_name_uploads_stay_independent() {
        let h = harness().await;
        let a = h.vault.upload("alice", notes(b"first")).await.unwrap();
        let other_key = UploadRequest {
            key: b"fedcba9876543210",
            ..notes(b"second")
        };
        let b = h.vault.upload("bob", other_key).await.unwrap();

        assert_eq!(h.vault.download("alice", a, KEY).await.unwrap().plaintext, b"first");
        assert_eq!(
            h.vault
                .download("bob", b, b"fedcba9876543210")
                .await
                .unwrap()
                .plaintext,
            b"second"
        );
        assert!(matches!(
            h.vault.download("alice", b, KEY).await,
            Err(VaultError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_object_reported() {
        let h = harness().await;
        let id = h.vault.upload("alice", notes(b"hello")).await.unwrap();
        let record = h.catalog.find_by_id(id).await.unwrap().unwrap();
        h.objects.delete(&record.stored_object_name).await.unwrap();

        let err = h.vault.download("alice", id, KEY).await.unwrap_err();
        assert!(matches!(err, VaultError::ObjectMissing { file_id } if file_id == id));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_corrupted_ciphertext_is_integrity_error() {
        let h = harness().await;
        let id = h.vault.upload("alice", notes(b"hello")).await.unwrap();
        let record = h.catalog.find_by_id(id).await.unwrap().unwrap();
        h.objects
            .put(&record.stored_object_name, &[0u8; 15])
            .await
            .unwrap();

        let err = h.vault.download("alice", id, KEY).await.unwrap_err();
        assert!(matches!(err, VaultError::DecryptionFailed { .. }));
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_same_owner() {
        let h = harness().await;
        let mut tasks = Vec::new();
        for i in 0..16u8 {
            let vault = h.vault.clone();
            tasks.push(tokio::spawn(async move {
                let data = vec![i; 40];
                vault
                    .upload(
                        "alice",
                        UploadRequest {
                            logical_name: "same.bin",
                            content_type: None,
                            data: &data,
                            key: KEY,
                        },
                    )
                    .await
                    .unwrap()
            }));
        }
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        assert_eq!(h.objects.len().await, 16);
        for (i, id) in ids.into_iter().enumerate() {
            let file = h.vault.download("alice", id, KEY).await.unwrap();
            assert_eq!(file.plaintext, vec![i as u8; 40]);
        }
    }

    // --- partial-failure compensation ---

    struct FailingPut;

    #[async_trait]
    impl ObjectStore for FailingPut {
        async fn put(&self, _: &str, _: &[u8]) -> ObjectStoreResult<()> {
            Err(ObjectStoreError::Permanent("bucket unavailable".into()))
        }
        async fn get(&self, name: &str) -> ObjectStoreResult<Vec<u8>> {
            Err(ObjectStoreError::NotFound(name.into()))
        }
        async fn delete(&self, _: &str) -> ObjectStoreResult<()> {
            Ok(())
        }
        async fn check(&self) -> ObjectStoreResult<()> {
            Ok(())
        }
    }

    /// Writes the object, then reports the attempt as timed out.
    struct LatePut {
        inner: Arc<MemoryObjectStore>,
        written: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl ObjectStore for LatePut {
        async fn put(&self, name: &str, bytes: &[u8]) -> ObjectStoreResult<()> {
            self.inner.put(name, bytes).await?;
            *self.written.lock().unwrap() = Some(name.to_string());
            Err(ObjectStoreError::Timeout(std::time::Duration::from_secs(5)))
        }
        async fn get(&self, name: &str) -> ObjectStoreResult<Vec<u8>> {
            self.inner.get(name).await
        }
        async fn delete(&self, name: &str) -> ObjectStoreResult<()> {
            self.inner.delete(name).await
        }
        async fn check(&self) -> ObjectStoreResult<()> {
            Ok(())
        }
    }

    /// Delegates to SQLite but can be told to fail inserts.
    struct FlakyCatalog {
        inner: Arc<SqliteFileCatalog>,
        fail_insert: AtomicBool,
    }

    #[async_trait]
    impl FileCatalog for FlakyCatalog {
        async fn insert(&self, record: &FileRecord) -> RecordResult<()> {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(RecordError::Sqlx(sqlx::Error::PoolTimedOut));
            }
            self.inner.insert(record).await
        }
        async fn find_by_id(&self, id: Uuid) -> RecordResult<Option<FileRecord>> {
            self.inner.find_by_id(id).await
        }
        async fn list_by_owner(&self, owner_id: &str) -> RecordResult<Vec<FileRecord>> {
            self.inner.list_by_owner(owner_id).await
        }
        async fn remove(&self, id: Uuid) -> RecordResult<bool> {
            self.inner.remove(id).await
        }
    }

    struct FailingKeyStore;

    #[async_trait]
    impl KeyStore for FailingKeyStore {
        async fn insert(&self, _: &KeyRecord) -> RecordResult<()> {
            Err(RecordError::Sqlx(sqlx::Error::PoolTimedOut))
        }
        async fn find_by_owner_and_file(
            &self,
            _: &str,
            _: Uuid,
        ) -> RecordResult<Option<KeyRecord>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_put_failure_leaves_no_records() {
        let h = harness().await;
        let vault = VaultService::new(h.catalog.clone(), h.keys.clone(), Arc::new(FailingPut));

        let err = vault.upload("alice", notes(b"hello")).await.unwrap_err();
        assert!(matches!(err, VaultError::StorageWriteFailed(_)));
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(h.catalog.list_by_owner("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_put_discards_late_object() {
        let h = harness().await;
        let store = Arc::new(LatePut {
            inner: h.objects.clone(),
            written: std::sync::Mutex::new(None),
        });
        let vault = VaultService::new(h.catalog.clone(), h.keys.clone(), store.clone());

        let err = vault.upload("alice", notes(b"hello")).await.unwrap_err();
        assert!(matches!(
            err,
            VaultError::StorageWriteFailed(ObjectStoreError::Timeout(_))
        ));
        let name = store.written.lock().unwrap().clone().unwrap();
        assert!(!h.objects.contains(&name).await);
        assert!(h.catalog.list_by_owner("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_failure_deletes_orphan_object() {
        let h = harness().await;
        let catalog = Arc::new(FlakyCatalog {
            inner: h.catalog.clone(),
            fail_insert: AtomicBool::new(true),
        });
        let vault = VaultService::new(catalog, h.keys.clone(), h.objects.clone());

        let err = vault.upload("alice", notes(b"hello")).await.unwrap_err();
        assert!(matches!(err, VaultError::CatalogWriteFailed(_)));
        assert!(h.objects.is_empty().await);
        assert!(h.catalog.list_by_owner("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_key_failure_rolls_back_record_and_object() {
        let h = harness().await;
        let vault = VaultService::new(h.catalog.clone(), Arc::new(FailingKeyStore), h.objects.clone());

        let err = vault.upload("alice", notes(b"hello")).await.unwrap_err();
        assert!(matches!(err, VaultError::KeyRecordWriteFailed(_)));
        assert!(h.objects.is_empty().await);
        assert!(h.catalog.list_by_owner("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_files_scoped_to_owner() {
        let h = harness().await;
        h.vault.upload("alice", notes(b"a")).await.unwrap();
        h.vault.upload("alice", notes(b"b")).await.unwrap();
        h.vault.upload("bob", notes(b"c")).await.unwrap();

        assert_eq!(h.vault.list_files("alice").await.unwrap().len(), 2);
        assert_eq!(h.vault.list_files("bob").await.unwrap().len(), 1);
    }
}
