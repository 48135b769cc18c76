//! Zip archive construction.
//!
//! Every regular file under the root becomes one deflated entry at its
//! relative path. Executable files are written with Unix mode 0755 so the
//! function runtime extracts them executable; everything else gets 0644.

use std::fs::{File, Metadata};
use std::io::{Seek, Write};
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PackError;
use crate::fingerprint::{relative_path, walk};

pub const EXECUTABLE_MODE: u32 = 0o755;
pub const REGULAR_MODE: u32 = 0o644;

/// Write an archive of `root` into `writer`. Returns the number of files written.
pub fn write_archive<W: Write + Seek>(root: &Path, writer: W) -> Result<usize, PackError> {
    let mut zip = ZipWriter::new(writer);
    let mut file_count = 0;

    for entry in walk(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = relative_path(root, entry.path())?;
        let metadata = entry.metadata()?;
        let mode = if is_executable(&metadata) {
            EXECUTABLE_MODE
        } else {
            REGULAR_MODE
        };

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(mode);

        debug!(entry = %name, mode = %format!("{mode:o}"), "adding archive entry");
        zip.start_file(name.as_str(), options)?;
        let mut file = File::open(entry.path()).map_err(PackError::io(entry.path()))?;
        std::io::copy(&mut file, &mut zip).map_err(PackError::io(entry.path()))?;
        file_count += 1;
    }

    zip.finish()?.flush().map_err(ZipError::Io)?;
    Ok(file_count)
}

#[cfg(unix)]
fn is_executable(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &Metadata) -> bool {
    false
}
