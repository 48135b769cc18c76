//! Packaging error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("source folder not found: {0}")]
    MissingSource(PathBuf),

    #[error("source is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Core(#[from] fnship_core::CoreError),
}

impl PackError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| PackError::Io { path, source }
    }
}
