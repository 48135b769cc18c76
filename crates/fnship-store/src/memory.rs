//! In-memory object backend.
//!
//! Mirrors the S3 semantics the version store relies on: buckets must exist
//! before use and must be empty before they can be deleted.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backend::{ObjectBackend, ObjectEntry};
use crate::error::{StoreError, StoreResult};

type Bucket = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    buckets: Mutex<BTreeMap<String, Bucket>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes of a stored object.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let buckets = self.buckets.lock().await;
        buckets.get(bucket)?.get(key).cloned()
    }

    /// Store bytes directly, bypassing the filesystem.
    pub async fn insert(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        let mut buckets = self.buckets.lock().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::NoSuchContainer(bucket.to_string()))?;
        objects.insert(key.to_string(), bytes);
        Ok(())
    }
}

#[async_trait]
impl ObjectBackend for InMemoryBackend {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self.buckets.lock().await.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.lock().await;
        if buckets.contains_key(bucket) {
            return Err(StoreError::ContainerExists(bucket.to_string()));
        }
        buckets.insert(bucket.to_string(), Bucket::new());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.lock().await;
        match buckets.get(bucket) {
            None => Err(StoreError::NoSuchContainer(bucket.to_string())),
            Some(objects) if !objects.is_empty() => {
                Err(StoreError::ContainerNotEmpty(bucket.to_string()))
            }
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }

    async fn list_objects(&self, bucket: &str) -> StoreResult<Vec<ObjectEntry>> {
        let buckets = self.buckets.lock().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::NoSuchContainer(bucket.to_string()))?;
        Ok(objects
            .iter()
            .map(|(key, bytes)| ObjectEntry {
                key: key.clone(),
                size_bytes: bytes.len() as u64,
            })
            .collect())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<()> {
        let mut buckets = self.buckets.lock().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::NoSuchContainer(bucket.to_string()))?;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, file: &Path) -> StoreResult<()> {
        let bytes = tokio::fs::read(file).await.map_err(|source| StoreError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        self.insert(bucket, key, bytes).await
    }
}
