//! fnship-pack: fingerprint a source folder and build its deployment archive.
//!
//! The archive file is named after the content digest, so packaging the same
//! tree twice produces the same path and the same digest.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use fnship_core::ContentDigest;
use tracing::info;

pub mod archive;
pub mod error;
pub mod fingerprint;

pub use archive::write_archive;
pub use error::PackError;
pub use fingerprint::fingerprint_dir;

#[derive(Debug)]
pub struct PackResult {
    pub archive_path: PathBuf,
    pub digest: ContentDigest,
    pub size_bytes: u64,
    pub file_count: usize,
}

/// Fingerprint `source` and write `fnship-<digest>.zip` into `out_dir`.
pub fn pack(source: &Path, out_dir: &Path) -> Result<PackResult, PackError> {
    if !source.exists() {
        return Err(PackError::MissingSource(source.to_path_buf()));
    }
    if !source.is_dir() {
        return Err(PackError::NotADirectory(source.to_path_buf()));
    }

    let digest = fingerprint_dir(source)?;
    let archive_path = out_dir.join(format!("fnship-{digest}.zip"));

    let file = File::create(&archive_path).map_err(PackError::io(&archive_path))?;
    let file_count = write_archive(source, BufWriter::new(file))?;
    let size_bytes = std::fs::metadata(&archive_path)
        .map_err(PackError::io(&archive_path))?
        .len();

    info!(
        source = %source.display(),
        digest = %digest,
        files = file_count,
        bytes = size_bytes,
        "packaged source folder"
    );

    Ok(PackResult {
        archive_path,
        digest,
        size_bytes,
        file_count,
    })
}

/// [`pack`] into the system temporary directory.
pub fn pack_to_temp(source: &Path) -> Result<PackResult, PackError> {
    pack(source, &std::env::temp_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_pack_names_archive_after_digest() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(src.path().join("index.js"), b"exports.handler = () => 1;").unwrap();

        let result = pack(src.path(), out.path()).unwrap();
        assert_eq!(result.file_count, 1);
        assert!(result.size_bytes > 0);
        assert_eq!(
            result.archive_path,
            out.path().join(format!("fnship-{}.zip", result.digest))
        );
        assert_eq!(result.digest, fingerprint_dir(src.path()).unwrap());
    }

    #[test]
    fn test_pack_missing_folder() {
        let out = tempfile::tempdir().unwrap();
        let err = pack(&out.path().join("nope"), out.path()).unwrap_err();
        assert!(matches!(err, PackError::MissingSource(_)));
    }

    #[test]
    fn test_pack_rejects_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.go");
        fs::write(&file, b"package main").unwrap();
        let err = pack(&file, dir.path()).unwrap_err();
        assert!(matches!(err, PackError::NotADirectory(_)));
    }
}
