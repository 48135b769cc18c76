//! Error types for names, artifact keys, and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid resource name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid deployment id {id:?}: only lowercase letters and digits are allowed")]
    InvalidId { id: String },

    #[error("invalid artifact key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid content digest {0:?}: expected lowercase hex")]
    InvalidDigest(String),

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
