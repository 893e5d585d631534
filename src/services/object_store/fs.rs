//! Local-disk backend. Objects live under
//! `base_path/{shard}/{shard}/{name}` where the shards come from MD5(name).

use super::{ObjectStore, ObjectStoreError, ObjectStoreResult};
use async_trait::async_trait;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_NAME_LEN: usize = 1024;

#[derive(Clone, Debug)]
pub struct FsObjectStore {
    base_path: PathBuf,
}

impl FsObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Reject names that could escape `base_path`.
    fn ensure_name_safe(name: &str) -> ObjectStoreResult<()> {
        if name.is_empty() || name.len() > MAX_OBJECT_NAME_LEN {
            return Err(ObjectStoreError::InvalidName);
        }
        if name.starts_with('/') || name.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(ObjectStoreError::InvalidName);
        }
        if name
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ObjectStoreError::InvalidName);
        }
        Ok(())
    }

    /// Two-level shard directory names, `00`–`ff` each.
    fn shards(name: &str) -> (String, String) {
        let digest = md5::compute(name);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, name: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(name);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(name);
        path
    }

    /// Remove empty directories from `start` up to (not including) `base_path`.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(()) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    /// Write to a temp file, fsync, then rename into place.
    async fn put(&self, name: &str, bytes: &[u8]) -> ObjectStoreResult<()> {
        Self::ensure_name_safe(name)?;

        let file_path = self.object_path(name);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let write = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &file_path).await
        };

        if let Err(err) = write.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        Ok(())
    }

    async fn get(&self, name: &str) -> ObjectStoreResult<Vec<u8>> {
        Self::ensure_name_safe(name)?;
        fs::read(self.object_path(name)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::NotFound(name.to_string())
            } else {
                ObjectStoreError::Io(err)
            }
        })
    }

    async fn delete(&self, name: &str) -> ObjectStoreResult<()> {
        Self::ensure_name_safe(name)?;
        let file_path = self.object_path(name);
        match fs::remove_file(&file_path).await {
            Ok(()) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(ObjectStoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    /// Write, read back and remove a probe file under `base_path`.
    async fn check(&self) -> ObjectStoreResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let probe = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        if read_back? != b"readyz" {
            return Err(ObjectStoreError::Permanent("probe content mismatch".into()));
        }
        Ok(())
    }
}
