//! pdfsync Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Keeps a local mirror of published PDF reports, turns the table inside each report
//! into a CSV file, and bundles the CSV files into one zip archive.
//!
//! # Stages
//!
//! - **Discovery**: find report URLs on an index page ([`discovery`])
//! - **Fetch**: download a report only when the remote copy is newer ([`fetch`])
//! - **Transform**: a worker pool fed by a task queue detects, merges and repairs
//!   tables and writes CSV output only when it is stale ([`pool`], [`transform`])
//! - **Archive**: zip the output directory ([`archive`])
//!
//! # Example
//!
//! ```no_run
//! use pdfsync_ingest::config::IngestConfig;
//! use pdfsync_ingest::detect::CamelotDetector;
//! use pdfsync_ingest::discovery::StaticDiscovery;
//! use pdfsync_ingest::pipeline::Pipeline;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::builder().workers(4).build();
//!     let discovery = StaticDiscovery::new(vec![
//!         "https://example.org/reports/Expansions_2024.pdf".to_string(),
//!     ]);
//!
//!     let pipeline = Pipeline::new(config, Arc::new(discovery), Arc::new(CamelotDetector::default()))?;
//!     let report = pipeline.run().await?;
//!     println!("{} CSV files written", report.written);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod detect;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod queue;
pub mod reconcile;
pub mod staleness;
pub mod transform;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use pipeline::{Pipeline, RunReport};
