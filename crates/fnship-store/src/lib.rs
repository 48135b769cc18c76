//! fnship-store: deployment artifacts kept as an append-only version store.
//!
//! Each resource name owns one bucket. Artifacts are stored under
//! `<unix-seconds>-<sha256>.zip`, so a listing recovers every upload's time
//! and content digest without any side index.
//!
//! # Components
//!
//! - **`backend`**: the `ObjectBackend` trait (buckets and objects only)
//! - **`s3`** / **`memory`**: S3 and in-memory backends
//! - **`store`**: `VersionStore`, which owns all key logic
//! - **`resolver`**: digest-prefix resolution for rollbacks

pub mod backend;
pub mod error;
pub mod memory;
pub mod resolver;
pub mod s3;
pub mod store;

pub use backend::{ObjectBackend, ObjectEntry};
pub use error::{ResolveError, StoreError, StoreResult};
pub use memory::InMemoryBackend;
pub use s3::S3Backend;
pub use store::{StoredArtifact, VersionStore};
