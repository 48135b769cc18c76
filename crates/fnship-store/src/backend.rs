//! Object storage backend trait.
//!
//! Backends are dumb bucket/object adapters. They know nothing about
//! artifact keys, digests, or timestamps; that lives in
//! [`VersionStore`](crate::VersionStore).

use std::path::Path;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Maximum number of keys removed per batch delete request.
pub const DELETE_BATCH_SIZE: usize = 1000;

/// One stored object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size_bytes: u64,
}

#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Whether the bucket exists and is reachable.
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Remove an empty bucket. Non-empty buckets are refused.
    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Every object in the bucket, across all pages.
    async fn list_objects(&self, bucket: &str) -> StoreResult<Vec<ObjectEntry>>;

    /// Delete up to [`DELETE_BATCH_SIZE`] keys.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<()>;

    /// Upload a local file under `key`.
    async fn put_object(&self, bucket: &str, key: &str, file: &Path) -> StoreResult<()>;
}
