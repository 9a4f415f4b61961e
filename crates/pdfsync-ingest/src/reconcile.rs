//! Table reconciliation
//!
//! The detector returns one region per table per page. Reports repeat a title row and
//! the column header at the top of the first region, and one known variant of the
//! report has a corrupted first header cell plus a spurious trailing column. This
//! module merges the regions into a single table, repairs that variant, and serializes
//! the result as CSV.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::detect::{PageRange, TableDetector, TableRegion};
use crate::error::ReconcileError;

/// Expected first column name
pub const FIRST_COLUMN: &str = "Number";

/// Width of the repaired broken variant
pub const BROKEN_VARIANT_WIDTH: usize = 10;

/// Title and header rows the detector puts in front of the data
const LEADING_ROWS: usize = 2;

/// A merged, width-consistent table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Original first header cell when the broken variant was repaired
    pub repaired_from: Option<String>,
}

impl ExtractedTable {
    /// CSV text: header line first, then one line per row.
    pub fn to_csv(&self) -> Result<String, ReconcileError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ReconcileError::Csv(e.into_error().into()))?;
        // Every field came from a `String`, so the output is valid UTF-8.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Merges detector output into one table per document
#[derive(Clone)]
pub struct TableReconciler {
    detector: Arc<dyn TableDetector>,
}

impl TableReconciler {
    pub fn new(detector: Arc<dyn TableDetector>) -> Self {
        Self { detector }
    }

    /// Detect, merge and repair the table in `document`.
    pub fn extract(&self, document: &Path) -> Result<ExtractedTable, ReconcileError> {
        let regions = self.detector.detect(document, PageRange::All)?;
        let table = reconcile(regions)?;

        if let Some(found) = &table.repaired_from {
            warn!(
                path = %document.display(),
                found = %found,
                "Header does not start with '{}', applied repair",
                FIRST_COLUMN
            );
        }

        debug!(
            path = %document.display(),
            columns = table.header.len(),
            rows = table.rows.len(),
            "Reconciled table"
        );
        Ok(table)
    }

    /// [`extract`](Self::extract) followed by CSV serialization
    pub fn extract_csv(&self, document: &Path) -> Result<String, ReconcileError> {
        let table = self.extract(document)?;
        if table.rows.is_empty() {
            warn!(path = %document.display(), "Reconciled table has no data rows");
        }
        table.to_csv()
    }
}

/// Merge detected regions into one table.
///
/// The header comes from the second row of the first region. The first two rows of
/// the concatenated regions are dropped. When the header does not start with
/// [`FIRST_COLUMN`] the document is the broken variant: the first header cell is
/// replaced and every row is cut to [`BROKEN_VARIANT_WIDTH`] columns.
///
/// Rows narrower than the header are padded with empty cells. Any row wider than the
/// header, leading rows included, is a structural error.
pub fn reconcile(regions: Vec<TableRegion>) -> Result<ExtractedTable, ReconcileError> {
    let mut header = regions
        .first()
        .and_then(|region| region.rows.get(1))
        .cloned()
        .ok_or(ReconcileError::MissingHeader)?;

    let repaired_from = repair_header(&mut header);
    let broken = repaired_from.is_some();

    let mut rows: Vec<Vec<String>> = regions.into_iter().flat_map(|region| region.rows).collect();

    if broken {
        header.truncate(BROKEN_VARIANT_WIDTH);
        for row in &mut rows {
            row.truncate(BROKEN_VARIANT_WIDTH);
        }
    }

    let width = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);
    if width != header.len() {
        return Err(ReconcileError::Structural {
            expected: header.len(),
            found: width,
        });
    }

    let rows = rows
        .into_iter()
        .skip(LEADING_ROWS)
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    Ok(ExtractedTable {
        header,
        rows,
        repaired_from,
    })
}

/// Force the first header cell to [`FIRST_COLUMN`], returning the replaced value.
fn repair_header(header: &mut [String]) -> Option<String> {
    match header.first_mut() {
        Some(first) if first.trim() != FIRST_COLUMN => {
            Some(std::mem::replace(first, FIRST_COLUMN.to_string()))
        },
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn numbered(prefix: &str, width: usize) -> Vec<String> {
        (0..width).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_single_region_well_formed() {
        let region = TableRegion::new(vec![
            row(&["Deviations", "", ""]),
            row(&["Number", "Entity", "Amount"]),
            row(&["1", "Dept A", "100"]),
            row(&["2", "Dept B", "200"]),
        ]);

        let table = reconcile(vec![region]).unwrap();
        assert_eq!(table.header, row(&["Number", "Entity", "Amount"]));
        assert_eq!(table.rows, vec![row(&["1", "Dept A", "100"]), row(&["2", "Dept B", "200"])]);
    }

    #[test]
    fn test_regions_concatenated_in_order() {
        let first = TableRegion::new(vec![
            row(&["title", ""]),
            row(&[" Number ", "Entity"]),
            row(&["1", "A"]),
        ]);
        let second = TableRegion::new(vec![row(&["2", "B"]), row(&["3", "C"])]);

        let table = reconcile(vec![first, second]).unwrap();
        // Whitespace around the header cell is tolerated and left alone
        assert_eq!(table.header[0], " Number ");
        let ids: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_broken_variant_repaired_and_truncated() {
        let mut header = numbered("col", 11);
        header[0] = "Numb\ner".to_string();

        let region = TableRegion::new(vec![
            numbered("title", 11),
            header,
            numbered("a", 11),
            numbered("b", 11),
        ]);
        let later = TableRegion::new(vec![numbered("c", 11)]);

        let table = reconcile(vec![region, later]).unwrap();
        assert_eq!(table.header[0], "Number");
        assert_eq!(table.header.len(), BROKEN_VARIANT_WIDTH);
        assert_eq!(table.rows.len(), 3);
        assert!(table.rows.iter().all(|r| r.len() == table.header.len()));
        assert_eq!(table.rows[2][9], "c9");
        assert_eq!(table.repaired_from.as_deref(), Some("Numb\ner"));
    }

    #[test]
    fn test_header_only_first_region() {
        let first = TableRegion::new(vec![
            row(&["Title", "", ""]),
            row(&["Number", "Entity", "Notes"]),
        ]);
        let second = TableRegion::new(vec![row(&["1", "A"]), row(&["2", "B"])]);

        let table = reconcile(vec![first, second]).unwrap();
        assert_eq!(table.header, row(&["Number", "Entity", "Notes"]));
        assert_eq!(table.rows, vec![row(&["1", "A", ""]), row(&["2", "B", ""])]);
        assert!(table.repaired_from.is_none());
    }

    #[test]
    fn test_wide_title_row_is_structural() {
        let first = TableRegion::new(vec![
            row(&["Title", "", "", ""]),
            row(&["Number", "Entity"]),
            row(&["1", "A"]),
        ]);

        assert!(matches!(
            reconcile(vec![first]),
            Err(ReconcileError::Structural {
                expected: 2,
                found: 4
            })
        ));
    }

    #[test]
    fn test_extract_reports_repair() {
        struct Fixed;

        impl TableDetector for Fixed {
            fn detect(&self, _: &Path, _: PageRange) -> Result<Vec<TableRegion>, crate::error::DetectError> {
                Ok(vec![TableRegion::new(vec![
                    row(&["Title", ""]),
                    row(&["No.", "Entity"]),
                    row(&["1", "A"]),
                ])])
            }
        }

        let reconciler = TableReconciler::new(Arc::new(Fixed));
        let table = reconciler.extract(Path::new("reports/broken.pdf")).unwrap();
        assert_eq!(table.repaired_from.as_deref(), Some("No."));
        assert_eq!(
            reconciler.extract_csv(Path::new("reports/broken.pdf")).unwrap(),
            "Number,Entity\n1,A\n"
        );
    }

    #[test]
    fn test_narrow_region_padded() {
        let first = TableRegion::new(vec![
            row(&["t", "", ""]),
            row(&["Number", "Entity", "Amount"]),
            row(&["1", "A", "10"]),
        ]);
        let second = TableRegion::new(vec![row(&["2", "B"])]);

        let table = reconcile(vec![first, second]).unwrap();
        assert_eq!(table.rows[1], row(&["2", "B", ""]));
    }

    #[test]
    fn test_width_mismatch_is_structural() {
        let first = TableRegion::new(vec![
            row(&["t", ""]),
            row(&["Number", "Entity"]),
            row(&["1", "A", "extra"]),
        ]);

        let err = reconcile(vec![first]).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Structural {
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn test_missing_header_row() {
        assert!(matches!(reconcile(vec![]), Err(ReconcileError::MissingHeader)));
        let lonely = TableRegion::new(vec![row(&["only one row"])]);
        assert!(matches!(reconcile(vec![lonely]), Err(ReconcileError::MissingHeader)));
    }

    #[test]
    fn test_to_csv_quotes_fields() {
        let table = ExtractedTable {
            header: row(&["Number", "Description"]),
            rows: vec![row(&["1", "Supply, delivery \"urgent\""]), row(&["2", "two\nlines"])],
            repaired_from: None,
        };

        assert_eq!(
            table.to_csv().unwrap(),
            "Number,Description\n1,\"Supply, delivery \"\"urgent\"\"\"\n2,\"two\nlines\"\n"
        );
    }
}
