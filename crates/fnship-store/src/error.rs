//! Error types for the version store.

use std::path::PathBuf;

use fnship_core::ArtifactKey;
use thiserror::Error;

/// Result type alias for version store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage container not found: {0}")]
    NoSuchContainer(String),

    #[error("storage container already exists: {0}")]
    ContainerExists(String),

    #[error("storage container is not empty: {0}")]
    ContainerNotEmpty(String),

    #[error("{operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl StoreError {
    pub(crate) fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        StoreError::Backend {
            operation,
            message: message.into(),
            source: None,
        }
    }
}

/// Failure to pin a digest prefix to exactly one stored artifact.
#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("no version found matching {prefix:?}")]
    NoVersionFound { prefix: String },

    #[error(
        "multiple versions found for {prefix:?}, use --time to specify the exact one among:\n{}",
        render_candidates(.candidates)
    )]
    Ambiguous {
        prefix: String,
        candidates: Vec<ArtifactKey>,
    },
}

fn render_candidates(candidates: &[ArtifactKey]) -> String {
    candidates
        .iter()
        .map(|key| format!(" - time: {}\tsha256: {}", key.timestamp, key.digest))
        .collect::<Vec<_>>()
        .join("\n")
}
