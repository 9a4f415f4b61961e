//! Error types shared across pdfsync crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shared pdfsync operations
pub type Result<T> = std::result::Result<T, PdfsyncError>;

/// Error type for the shared helpers
#[derive(Error, Debug)]
pub enum PdfsyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{} exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl PdfsyncError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
