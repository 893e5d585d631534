//! In-memory backend. Not persistent; data is lost on drop.

use super::{ObjectStore, ObjectStoreError, ObjectStoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.objects.read().await.contains_key(name)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> ObjectStoreResult<()> {
        if name.is_empty() {
            return Err(ObjectStoreError::InvalidName);
        }
        self.objects
            .write()
            .await
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, name: &str) -> ObjectStoreResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(name.to_string()))
    }

    async fn delete(&self, name: &str) -> ObjectStoreResult<()> {
        self.objects.write().await.remove(name);
        Ok(())
    }

    async fn check(&self) -> ObjectStoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let store = MemoryObjectStore::new();
        store.put("k", b"v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), b"v");
        assert_eq!(store.len().await, 1);
        assert!(store.contains("k").await);
        assert!(!store.contains("other").await);
    }

    #[tokio::test]
    async fn test_not_found() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.get("missing").await,
            Err(ObjectStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let store = MemoryObjectStore::new();
        store.delete("k").await.unwrap();
        store.put("k", b"v").await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.is_empty().await);
    }
}
