//! pdfsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling, filesystem helpers, and logging setup for the pdfsync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`PdfsyncError`] and the [`Result`] alias
//! - **Files**: directory checks, modification times, atomic replacement
//! - **Logging**: `tracing` subscriber configuration shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use pdfsync_common::files::{ensure_directory, write_atomic};
//! use pdfsync_common::Result;
//!
//! fn save(dir: &std::path::Path, bytes: &[u8]) -> Result<()> {
//!     ensure_directory(dir)?;
//!     write_atomic(&dir.join("report.csv"), bytes)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod files;
pub mod logging;

// Re-export commonly used types
pub use error::{PdfsyncError, Result};
