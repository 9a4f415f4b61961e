//! Filesystem helpers used by the cache and output stages

use crate::error::{PdfsyncError, Result};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::SystemTime;
use tempfile::NamedTempFile;

/// Create `dir` (and its parents) if missing.
///
/// Fails with [`PdfsyncError::NotADirectory`] when the path exists but is a file.
pub fn ensure_directory(dir: &Path) -> Result<()> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(PdfsyncError::NotADirectory(dir.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            std::fs::create_dir_all(dir)?;
            Ok(())
        },
        Err(e) => Err(e.into()),
    }
}

/// Modification time of `path`, or `None` when nothing exists there.
pub fn modified_time(path: &Path) -> std::io::Result<Option<SystemTime>> {
    match std::fs::metadata(path) {
        Ok(meta) => meta.modified().map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replace `path` with `contents` without exposing a partially written file.
///
/// The bytes go to a temporary file in the same directory, which is then renamed
/// over the target.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PdfsyncError::Io(e.error))?;

    Ok(())
}
