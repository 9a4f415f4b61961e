//! Output cache: CSV artifacts derived from cached documents

use std::path::{Path, PathBuf};

use crate::naming::output_filename;
use crate::staleness::is_stale;
use pdfsync_common::files::{ensure_directory, modified_time, write_atomic};

/// Directory of derived CSV files
#[derive(Debug, Clone)]
pub struct OutputCache {
    output_dir: PathBuf,
}

impl OutputCache {
    /// Create the cache, creating `output_dir` when missing.
    pub fn new(output_dir: impl Into<PathBuf>) -> pdfsync_common::Result<Self> {
        let output_dir = output_dir.into();
        ensure_directory(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Output artifact path for a cached document
    pub fn target_for(&self, source: &Path) -> Option<PathBuf> {
        output_filename(source).map(|name| self.output_dir.join(name))
    }

    /// `true` when `target` exists and is not older than `source`.
    ///
    /// `source` must exist.
    pub fn is_current(&self, source: &Path, target: &Path) -> std::io::Result<bool> {
        let source_time = std::fs::metadata(source)?.modified()?;
        Ok(!is_stale(source_time, modified_time(target)?))
    }

    /// Replace `target` with `contents` atomically.
    pub fn persist(&self, target: &Path, contents: &str) -> pdfsync_common::Result<()> {
        write_atomic(target, contents.as_bytes())
    }
}
