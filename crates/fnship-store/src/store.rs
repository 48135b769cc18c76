//! VersionStore: artifact versioning on top of an object backend.
//!
//! Each resource name owns one container. Objects inside it are named by
//! [`ArtifactKey`]: upload time plus content digest. The container is
//! append-only; objects are only removed by destroying the container.

use std::collections::HashSet;
use std::path::Path;

use fnship_core::{ArtifactKey, ContentDigest, ResourceName};
use tracing::{debug, info};

use crate::backend::{DELETE_BATCH_SIZE, ObjectBackend};
use crate::error::StoreResult;
use crate::resolver;

/// An artifact present in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub key: ArtifactKey,
    pub size_bytes: u64,
}

pub struct VersionStore<B> {
    backend: B,
}

impl<B: ObjectBackend> VersionStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn exists(&self, container: &ResourceName) -> StoreResult<bool> {
        self.backend.bucket_exists(container.as_str()).await
    }

    pub async fn create(&self, container: &ResourceName) -> StoreResult<()> {
        self.backend.create_bucket(container.as_str()).await?;
        info!(%container, "version store created");
        Ok(())
    }

    /// Create the container if it is missing. Returns true if it was created.
    pub async fn ensure(&self, container: &ResourceName) -> StoreResult<bool> {
        if self.exists(container).await? {
            return Ok(false);
        }
        self.create(container).await?;
        Ok(true)
    }

    /// Purge every stored object, then remove the container.
    pub async fn destroy(&self, container: &ResourceName) -> StoreResult<()> {
        let keys: Vec<String> = self
            .backend
            .list_objects(container.as_str())
            .await?
            .into_iter()
            .map(|entry| entry.key)
            .collect();

        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            self.backend.delete_objects(container.as_str(), batch).await?;
        }
        self.backend.delete_bucket(container.as_str()).await?;
        info!(%container, purged = keys.len(), "version store destroyed");
        Ok(())
    }

    /// All artifacts, oldest first. Objects with foreign names are skipped.
    pub async fn list(&self, container: &ResourceName) -> StoreResult<Vec<StoredArtifact>> {
        let mut artifacts: Vec<StoredArtifact> = self
            .backend
            .list_objects(container.as_str())
            .await?
            .into_iter()
            .filter_map(|entry| match ArtifactKey::parse(&entry.key) {
                Ok(key) => Some(StoredArtifact {
                    key,
                    size_bytes: entry.size_bytes,
                }),
                Err(e) => {
                    debug!(%container, key = %entry.key, error = %e, "ignoring unrecognized object");
                    None
                }
            })
            .collect();
        artifacts.sort_by(|a, b| a.key.order_key().cmp(&b.key.order_key()));
        Ok(artifacts)
    }

    /// Whether any stored artifact carries exactly this digest.
    pub async fn has_digest(
        &self,
        container: &ResourceName,
        digest: &ContentDigest,
    ) -> StoreResult<bool> {
        Ok(self
            .list(container)
            .await?
            .iter()
            .any(|artifact| &artifact.key.digest == digest))
    }

    /// Upload `file` under a key stamped with the current time.
    pub async fn put(
        &self,
        container: &ResourceName,
        digest: &ContentDigest,
        file: &Path,
    ) -> StoreResult<ArtifactKey> {
        self.put_at(container, digest, file, chrono::Utc::now().timestamp())
            .await
    }

    /// Upload `file` under a key stamped with `timestamp`.
    ///
    /// An existing object is never overwritten: if the key is taken, the
    /// stamp moves forward to the next free second.
    pub async fn put_at(
        &self,
        container: &ResourceName,
        digest: &ContentDigest,
        file: &Path,
        timestamp: i64,
    ) -> StoreResult<ArtifactKey> {
        let taken: HashSet<String> = self
            .backend
            .list_objects(container.as_str())
            .await?
            .into_iter()
            .map(|entry| entry.key)
            .collect();

        let mut key = ArtifactKey::new(timestamp, digest.clone());
        while taken.contains(&key.to_string()) {
            debug!(%container, %key, "key taken, moving to the next second");
            key = ArtifactKey::new(key.timestamp + 1, digest.clone());
        }

        self.backend
            .put_object(container.as_str(), &key.to_string(), file)
            .await?;
        info!(%container, %key, "artifact uploaded");
        Ok(key)
    }

    /// Resolve a digest prefix (and optional upload time) to one stored key.
    pub async fn resolve(
        &self,
        container: &ResourceName,
        prefix: &str,
        time: Option<i64>,
    ) -> StoreResult<ArtifactKey> {
        let artifacts = self.list(container).await?;
        Ok(resolver::resolve(
            artifacts.iter().map(|a| &a.key),
            prefix,
            time,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResolveError, StoreError};
    use crate::memory::InMemoryBackend;

    fn container() -> ResourceName {
        ResourceName::from_existing("api-abc123")
    }

    fn digest(s: &str) -> ContentDigest {
        ContentDigest::new(s).unwrap()
    }

    fn archive_file(dir: &tempfile::TempDir, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("artifact.zip");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_ensure_creates_once() {
        let store = VersionStore::new(InMemoryBackend::new());
        assert!(!store.exists(&container()).await.unwrap());
        assert!(store.ensure(&container()).await.unwrap());
        assert!(!store.ensure(&container()).await.unwrap());
        assert!(store.exists(&container()).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_and_list_in_upload_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = archive_file(&dir, b"zip bytes");
        let store = VersionStore::new(InMemoryBackend::new());
        store.create(&container()).await.unwrap();

        let second = store.put_at(&container(), &digest("bb"), &file, 2000).await.unwrap();
        let first = store.put_at(&container(), &digest("aa"), &file, 1000).await.unwrap();

        let listed = store.list(&container()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].key, first);
        assert_eq!(listed[1].key, second);
        assert_eq!(listed[0].size_bytes, 9);
        assert_eq!(
            store.backend().object("api-abc123", "1000-aa.zip").await.unwrap(),
            b"zip bytes"
        );
    }

    #[tokio::test]
    async fn test_same_second_upload_keeps_both_versions() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(InMemoryBackend::new());
        store.create(&container()).await.unwrap();

        let first_file = archive_file(&dir, b"first");
        let first = store.put_at(&container(), &digest("abc"), &first_file, 1700).await.unwrap();
        let second_file = dir.path().join("second.zip");
        std::fs::write(&second_file, b"second").unwrap();
        let second = store.put_at(&container(), &digest("abc"), &second_file, 1700).await.unwrap();

        assert_eq!(first.to_string(), "1700-abc.zip");
        assert_eq!(second.to_string(), "1701-abc.zip");
        assert_eq!(store.list(&container()).await.unwrap().len(), 2);
        assert_eq!(
            store.backend().object("api-abc123", "1700-abc.zip").await.unwrap(),
            b"first"
        );
    }

    #[tokio::test]
    async fn test_back_to_back_puts_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let file = archive_file(&dir, b"x");
        let store = VersionStore::new(InMemoryBackend::new());
        store.create(&container()).await.unwrap();

        let first = store.put(&container(), &digest("abc"), &file).await.unwrap();
        let second = store.put(&container(), &digest("abc"), &file).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.list(&container()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_has_digest_ignores_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let file = archive_file(&dir, b"x");
        let store = VersionStore::new(InMemoryBackend::new());
        store.create(&container()).await.unwrap();
        store.put_at(&container(), &digest("abc"), &file, 1).await.unwrap();

        assert!(store.has_digest(&container(), &digest("abc")).await.unwrap());
        assert!(!store.has_digest(&container(), &digest("ab")).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_skips_foreign_objects() {
        let store = VersionStore::new(InMemoryBackend::new());
        store.create(&container()).await.unwrap();
        let backend = store.backend();
        backend.insert("api-abc123", "notes.txt", b"hi".to_vec()).await.unwrap();
        backend.insert("api-abc123", "1700-abc.zip", Vec::new()).await.unwrap();

        let listed = store.list(&container()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key.timestamp, 1700);
    }

    #[tokio::test]
    async fn test_destroy_purges_before_deleting() {
        let dir = tempfile::tempdir().unwrap();
        let file = archive_file(&dir, b"x");
        let store = VersionStore::new(InMemoryBackend::new());
        store.create(&container()).await.unwrap();
        for ts in 0..3 {
            store.put_at(&container(), &digest("abc"), &file, ts).await.unwrap();
        }

        store.destroy(&container()).await.unwrap();
        assert!(!store.exists(&container()).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_missing_container_propagates() {
        let store = VersionStore::new(InMemoryBackend::new());
        let err = store.list(&container()).await.unwrap_err();
        assert!(matches!(err, StoreError::NoSuchContainer(_)));
    }

    #[tokio::test]
    async fn test_resolve_against_store() {
        let dir = tempfile::tempdir().unwrap();
        let file = archive_file(&dir, b"x");
        let store = VersionStore::new(InMemoryBackend::new());
        store.create(&container()).await.unwrap();
        store.put_at(&container(), &digest("abc123"), &file, 1700).await.unwrap();
        store.put_at(&container(), &digest("abc999"), &file, 1800).await.unwrap();

        let key = store.resolve(&container(), "abc9", None).await.unwrap();
        assert_eq!(key.to_string(), "1800-abc999.zip");

        let err = store.resolve(&container(), "abc", None).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Resolve(ResolveError::Ambiguous { .. })
        ));
    }
}
