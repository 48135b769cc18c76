//! Content fingerprinting of a directory tree.
//!
//! Entries are visited depth-first in file-name order, so the digest does not
//! depend on how the filesystem enumerates a directory. The root's own name
//! is not hashed. Each directory contributes its relative path; each regular
//! file contributes its relative path, its length, and its bytes. Symlinks and
//! other special entries are skipped, as the packager skips them.

use std::fs::File;
use std::path::{Path, PathBuf};

use fnship_core::ContentDigest;
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::PackError;

const DIR_TAG: &[u8] = b"D";
const FILE_TAG: &[u8] = b"F";

/// Compute the SHA-256 content digest of everything under `root`.
pub fn fingerprint_dir(root: &Path) -> Result<ContentDigest, PackError> {
    let mut hasher = Sha256::new();

    for entry in walk(root) {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }
        let rel = relative_path(root, entry.path())?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            hasher.update(DIR_TAG);
            hasher.update(rel.as_bytes());
            hasher.update([0u8]);
        } else if file_type.is_file() {
            let mut file = File::open(entry.path()).map_err(PackError::io(entry.path()))?;
            let len = file
                .metadata()
                .map_err(PackError::io(entry.path()))?
                .len();
            hasher.update(FILE_TAG);
            hasher.update(rel.as_bytes());
            hasher.update([0u8]);
            hasher.update(len.to_be_bytes());
            std::io::copy(&mut file, &mut hasher).map_err(PackError::io(entry.path()))?;
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }

    Ok(ContentDigest::new(hex::encode(hasher.finalize()))?)
}

/// Sorted, non-following walk shared by the fingerprinter and the packager.
pub(crate) fn walk(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
}

/// Path of `path` relative to `root`, with `/` separators.
pub(crate) fn relative_path(root: &Path, path: &Path) -> Result<String, PackError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| PackError::NonUtf8Path(PathBuf::from(path)))?;
    let mut parts = Vec::new();
    for component in rel.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| PackError::NonUtf8Path(path.to_path_buf()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}
