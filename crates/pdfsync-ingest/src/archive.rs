//! Zip bundle of the output directory

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

/// Write every regular file directly inside `output_dir` into a zip at `archive_path`.
///
/// Entries are stored under their bare file names in name order. The archive itself is
/// skipped when it lives in `output_dir`. The previous archive is only replaced once
/// the new one is complete. Returns the number of entries.
pub fn build_archive(output_dir: &Path, archive_path: &Path) -> Result<usize> {
    let archive_name = archive_path.file_name();
    let same_dir = same_directory(output_dir, archive_path);

    let mut entries: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(output_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if same_dir && Some(entry.file_name().as_os_str()) == archive_name {
            continue;
        }
        // Names that are not valid UTF-8 cannot be stored portably.
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        entries.push((name, entry.path()));
    }
    entries.sort();

    let parent = archive_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent)?;

    {
        let mut zip = ZipWriter::new(tmp.as_file_mut());
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, path) in &entries {
            zip.start_file(name.as_str(), options)?;
            let mut source = File::open(path)?;
            let bytes = io::copy(&mut source, &mut zip)?;
            debug!(entry = %name, bytes, "Added to archive");
        }

        zip.finish()?.flush()?;
    }

    tmp.as_file().sync_all()?;
    tmp.persist(archive_path).map_err(|e| e.error)?;

    info!(
        archive = %archive_path.display(),
        entries = entries.len(),
        "Archive written"
    );
    Ok(entries.len())
}

fn same_directory(dir: &Path, file: &Path) -> bool {
    let parent = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match (dir.canonicalize(), parent.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
