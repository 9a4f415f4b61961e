//! Table detection boundary
//!
//! Turning PDF pages into candidate table regions is delegated to an external engine.
//! [`TableDetector`] is the seam; [`CamelotDetector`] drives the camelot command line
//! tool and reads back the CSV files it writes, one per detected table.

use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use tempfile::TempDir;
use tracing::debug;

use crate::error::DetectError;

/// Camelot names its output `<stem>-page-<p>-table-<t>.csv`.
#[allow(clippy::expect_used)]
static OUTPUT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-page-(\d+)-table-(\d+)\.csv$").expect("static pattern is valid")
});

/// One table region as emitted by the detector: raw rows, title and header rows included
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableRegion {
    pub rows: Vec<Vec<String>>,
}

impl TableRegion {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Pages to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageRange {
    #[default]
    All,
    /// Inclusive, 1-based
    Span(u32, u32),
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRange::All => f.write_str("1-end"),
            PageRange::Span(start, end) if start == end => write!(f, "{}", start),
            PageRange::Span(start, end) => write!(f, "{}-{}", start, end),
        }
    }
}

/// Finds table regions in a document, in page order
pub trait TableDetector: Send + Sync {
    fn detect(&self, document: &Path, pages: PageRange) -> Result<Vec<TableRegion>, DetectError>;
}

/// Runs the camelot CLI against a document
#[derive(Debug, Clone)]
pub struct CamelotDetector {
    program: String,
    flavor: String,
}

impl Default for CamelotDetector {
    fn default() -> Self {
        Self::new("camelot", "lattice")
    }
}

impl CamelotDetector {
    pub fn new(program: impl Into<String>, flavor: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            flavor: flavor.into(),
        }
    }

    fn run(&self, document: &Path, pages: PageRange, out_dir: &Path) -> Result<(), DetectError> {
        let output = Command::new(&self.program)
            .arg("--format")
            .arg("csv")
            .arg("--output")
            .arg(out_dir.join("tables.csv"))
            .arg("--pages")
            .arg(pages.to_string())
            .arg(&self.flavor)
            .arg(document)
            .output()
            .map_err(|e| DetectError::Command(format!("cannot start {}: {}", self.program, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(DetectError::Malformed {
            path: document.to_path_buf(),
            reason: if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            },
        })
    }
}

impl TableDetector for CamelotDetector {
    fn detect(&self, document: &Path, pages: PageRange) -> Result<Vec<TableRegion>, DetectError> {
        if !document.is_file() {
            return Err(DetectError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", document.display()),
            )));
        }

        let out_dir = TempDir::new()?;
        self.run(document, pages, out_dir.path())?;

        let regions = read_regions(out_dir.path())?;
        debug!(path = %document.display(), regions = regions.len(), "Detected tables");

        if regions.is_empty() {
            return Err(DetectError::NoTables(document.to_path_buf()));
        }
        Ok(regions)
    }
}

/// Read every per-table CSV in `dir`, ordered by page then table number.
pub fn read_regions(dir: &Path) -> Result<Vec<TableRegion>, DetectError> {
    let mut found: Vec<((u32, u32), PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(caps) = OUTPUT_NAME.captures(name) else {
            continue;
        };
        match (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
            (Ok(page), Ok(table)) => found.push(((page, table), path)),
            _ => debug!(file = %name, "Page or table number out of range, skipping"),
        }
    }
    found.sort();

    found
        .into_iter()
        .map(|(_, path)| read_region(&path))
        .collect()
}

fn read_region(path: &Path) -> Result<TableRegion, DetectError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }

    Ok(TableRegion::new(rows))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_range_display() {
        assert_eq!(PageRange::All.to_string(), "1-end");
        assert_eq!(PageRange::Span(2, 2).to_string(), "2");
        assert_eq!(PageRange::Span(1, 3).to_string(), "1-3");
    }

    #[test]
    fn test_read_regions_orders_by_page_then_table() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tables-page-10-table-1.csv"), "p10\n").unwrap();
        std::fs::write(dir.path().join("tables-page-2-table-2.csv"), "p2t2\n").unwrap();
        std::fs::write(dir.path().join("tables-page-2-table-1.csv"), "p2t1,x\n\"a,b\",c\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let regions = read_regions(dir.path()).unwrap();
        let firsts: Vec<&str> = regions.iter().map(|r| r.rows[0][0].as_str()).collect();

        assert_eq!(firsts, vec!["p2t1", "p2t2", "p10"]);
        assert_eq!(regions[0].rows[1], vec!["a,b".to_string(), "c".to_string()]);
        assert_eq!(regions[0].width(), 2);
    }

    #[test]
    fn test_read_regions_skips_out_of_range_numbers() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tables-page-1-table-1.csv"), "kept\n").unwrap();
        std::fs::write(dir.path().join("tables-page-99999999999-table-1.csv"), "dropped\n").unwrap();

        let regions = read_regions(dir.path()).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].rows[0][0], "kept");
    }

    #[test]
    fn test_missing_program_is_command_error() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let detector = CamelotDetector::new("pdfsync-no-such-detector", "lattice");
        let err = detector.detect(&pdf, PageRange::All).unwrap_err();
        assert!(matches!(err, DetectError::Command(_)));
    }

    #[test]
    fn test_missing_document_is_io_error() {
        let detector = CamelotDetector::default();
        let err = detector
            .detect(Path::new("/definitely/not/here.pdf"), PageRange::All)
            .unwrap_err();
        assert!(matches!(err, DetectError::Io(_)));
    }
}
