//! Error types for the ingestion pipeline
//!
//! Only [`IngestError`] aborts a run. The other enums describe per-item failures that
//! the workers log and count before moving on.

use pdfsync_common::PdfsyncError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal errors for a whole pipeline run
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{} exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Link discovery failed: {0}")]
    Discovery(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<PdfsyncError> for IngestError {
    fn from(err: PdfsyncError) -> Self {
        match err {
            PdfsyncError::NotADirectory(path) => IngestError::NotADirectory(path),
            PdfsyncError::Io(e) => IngestError::Io(e),
            PdfsyncError::Config(msg) | PdfsyncError::Parse(msg) => IngestError::Config(msg),
        }
    }
}

/// Per-URL failures of the fetch stage
#[derive(Error, Debug)]
pub enum FetchError {
    /// Metadata request failed; the URL is skipped for this run
    #[error("{url} unavailable: {reason}")]
    Unavailable { url: String, reason: String },

    /// Download failed and there is no earlier copy to fall back on
    #[error("{url} could not be downloaded and {} has no cached copy: {reason}", path.display())]
    NotCached {
        url: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Cannot derive a file name from {0}")]
    BadUrl(String),

    #[error("Cache write failed: {0}")]
    Cache(#[from] PdfsyncError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by a table-detection backend
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("No tables found in {}", .0.display())]
    NoTables(PathBuf),

    #[error("Malformed document {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Detector command failed: {0}")]
    Command(String),

    #[error("Detector IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Detector output unreadable: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures while turning detected regions into one table
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Table detection failed: {0}")]
    Detection(#[from] DetectError),

    /// Row and header widths disagree even after the known repairs
    #[error("Length mismatch: header has {expected} columns, rows have {found}")]
    Structural { expected: usize, found: usize },

    #[error("First table region has no header row")]
    MissingHeader,

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures of the per-item transform step run by workers
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Source document {} does not exist", .0.display())]
    MissingSource(PathBuf),

    #[error("Cannot derive an output name for {}", .0.display())]
    BadSourceName(PathBuf),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output write failed: {0}")]
    Persist(#[from] PdfsyncError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_message_names_both_widths() {
        let err = ReconcileError::Structural {
            expected: 10,
            found: 11,
        };
        assert_eq!(
            err.to_string(),
            "Length mismatch: header has 10 columns, rows have 11"
        );
    }

    #[test]
    fn test_not_a_directory_maps_through() {
        let err: IngestError = PdfsyncError::NotADirectory(PathBuf::from("csv")).into();
        assert!(matches!(err, IngestError::NotADirectory(p) if p == PathBuf::from("csv")));
    }
}
