//! Ingestion configuration
//!
//! Defaults mirror the published report index; every field can be overridden from the
//! environment (`PDFSYNC_*`) or the command line.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Page listing the downloadable reports
pub const DEFAULT_INDEX_URL: &str =
    "http://ocpo.treasury.gov.za/Suppliers_Area/Pages/Deviations-and-Exspansions.aspx";

/// Elements carrying this selector wrap one report link each
pub const DEFAULT_LINK_SELECTOR: &str = "div.link-item";

pub const DEFAULT_WORKERS: usize = 2;

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Page listing the source documents
    pub index_url: String,
    /// CSS selector for the elements wrapping each document link
    pub link_selector: String,
    /// Where downloaded documents are cached
    pub cache_dir: PathBuf,
    /// Where CSV output is written
    pub output_dir: PathBuf,
    /// Zip bundle written at the end of each run
    pub archive_path: PathBuf,
    /// Number of transform workers
    pub workers: usize,
    /// Queue capacity between fetch and transform (0 = unbounded)
    pub queue_capacity: usize,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Table detection program
    pub detector_program: String,
    /// Detection flavor passed to the program ("lattice" or "stream")
    pub detector_flavor: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            link_selector: DEFAULT_LINK_SELECTOR.to_string(),
            cache_dir: PathBuf::from("pdfs"),
            output_dir: PathBuf::from("csv"),
            archive_path: PathBuf::from("expansions_data.zip"),
            workers: DEFAULT_WORKERS,
            queue_capacity: 0,
            timeout_secs: 60,
            user_agent: format!("pdfsync/{}", env!("CARGO_PKG_VERSION")),
            detector_program: "camelot".to_string(),
            detector_flavor: "lattice".to_string(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables, falling back to defaults
    ///
    /// A `.env` file in the working directory is read first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(url) = std::env::var("PDFSYNC_INDEX_URL") {
            config.index_url = url;
        }
        if let Ok(selector) = std::env::var("PDFSYNC_LINK_SELECTOR") {
            config.link_selector = selector;
        }
        if let Ok(dir) = std::env::var("PDFSYNC_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("PDFSYNC_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("PDFSYNC_ARCHIVE") {
            config.archive_path = PathBuf::from(path);
        }
        if let Ok(workers) = std::env::var("PDFSYNC_WORKERS") {
            config.workers = parse_env("PDFSYNC_WORKERS", &workers)?;
        }
        if let Ok(capacity) = std::env::var("PDFSYNC_QUEUE_CAPACITY") {
            config.queue_capacity = parse_env("PDFSYNC_QUEUE_CAPACITY", &capacity)?;
        }
        if let Ok(timeout) = std::env::var("PDFSYNC_TIMEOUT_SECS") {
            config.timeout_secs = parse_env("PDFSYNC_TIMEOUT_SECS", &timeout)?;
        }
        if let Ok(program) = std::env::var("PDFSYNC_DETECTOR") {
            config.detector_program = program;
        }
        if let Ok(flavor) = std::env::var("PDFSYNC_DETECTOR_FLAVOR") {
            config.detector_flavor = flavor;
        }

        Ok(config)
    }

    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.index_url.trim().is_empty() {
            return Err(IngestError::Config("Index URL cannot be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(IngestError::Config("At least one worker is required".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(IngestError::Config("Timeout must be greater than 0".to_string()));
        }
        if self.cache_dir.as_os_str().is_empty() || self.output_dir.as_os_str().is_empty() {
            return Err(IngestError::Config(
                "Cache and output directories must be set".to_string(),
            ));
        }
        if self.archive_path.file_name().is_none() {
            return Err(IngestError::Config(format!(
                "Archive path {} has no file name",
                self.archive_path.display()
            )));
        }
        if self.detector_program.trim().is_empty() {
            return Err(IngestError::Config("Detector program cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| IngestError::Config(format!("{} = {:?}: {}", name, value, e)))
}

/// Builder for IngestConfig
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    index_url: Option<String>,
    cache_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    archive_path: Option<PathBuf>,
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    timeout_secs: Option<u64>,
    detector_program: Option<String>,
    detector_flavor: Option<String>,
}

impl IngestConfigBuilder {
    pub fn index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = Some(url.into());
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn detector_program(mut self, program: impl Into<String>) -> Self {
        self.detector_program = Some(program.into());
        self
    }

    pub fn detector_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.detector_flavor = Some(flavor.into());
        self
    }

    pub fn build(self) -> IngestConfig {
        let default = IngestConfig::default();

        IngestConfig {
            index_url: self.index_url.unwrap_or(default.index_url),
            link_selector: default.link_selector,
            cache_dir: self.cache_dir.unwrap_or(default.cache_dir),
            output_dir: self.output_dir.unwrap_or(default.output_dir),
            archive_path: self.archive_path.unwrap_or(default.archive_path),
            workers: self.workers.unwrap_or(default.workers),
            queue_capacity: self.queue_capacity.unwrap_or(default.queue_capacity),
            timeout_secs: self.timeout_secs.unwrap_or(default.timeout_secs),
            user_agent: default.user_agent,
            detector_program: self.detector_program.unwrap_or(default.detector_program),
            detector_flavor: self.detector_flavor.unwrap_or(default.detector_flavor),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workers, 2);
        assert_eq!(config.archive_path, PathBuf::from("expansions_data.zip"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = IngestConfig::builder()
            .cache_dir("/tmp/c")
            .output_dir("/tmp/o")
            .workers(4)
            .timeout_secs(5)
            .build();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/c"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/o"));
        assert_eq!(config.workers, 4);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.link_selector, DEFAULT_LINK_SELECTOR);
    }

    #[test]
    fn test_invalid_config() {
        assert!(IngestConfig::builder().workers(0).build().validate().is_err());
        assert!(IngestConfig::builder().timeout_secs(0).build().validate().is_err());
        assert!(IngestConfig::builder().index_url("  ").build().validate().is_err());
        assert!(IngestConfig::builder().archive_path("/").build().validate().is_err());
    }

    #[test]
    fn test_parse_env_reports_variable() {
        let err = parse_env::<usize>("PDFSYNC_WORKERS", "many").unwrap_err();
        assert!(err.to_string().contains("PDFSYNC_WORKERS"));
    }
}
