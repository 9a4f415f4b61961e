//! Per-document transform run by the workers

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::TransformError;
use crate::output::OutputCache;
use crate::pool::{ItemOutcome, ItemProcessor};
use crate::queue::QueueItem;
use crate::reconcile::TableReconciler;

/// Turns a cached document into its CSV artifact unless the artifact is current.
///
/// On any failure the existing artifact is left as it was.
#[derive(Clone)]
pub struct TransformStep {
    output: OutputCache,
    reconciler: TableReconciler,
}

impl TransformStep {
    pub fn new(output: OutputCache, reconciler: TableReconciler) -> Self {
        Self { output, reconciler }
    }
}

#[async_trait]
impl ItemProcessor for TransformStep {
    async fn process(&self, item: &QueueItem) -> Result<ItemOutcome, TransformError> {
        let source = item.local_path.clone();
        if !source.is_file() {
            return Err(TransformError::MissingSource(source));
        }

        let target = self
            .output
            .target_for(&source)
            .ok_or_else(|| TransformError::BadSourceName(source.clone()))?;

        if self.output.is_current(&source, &target)? {
            info!(path = %source.display(), "File already processed");
            return Ok(ItemOutcome::UpToDate(target));
        }

        info!(path = %source.display(), "Processing file");

        // Detection shells out and blocks.
        let reconciler = self.reconciler.clone();
        let document = source.clone();
        let csv = tokio::task::spawn_blocking(move || reconciler.extract_csv(&document)).await??;

        self.output.persist(&target, &csv)?;
        debug!(path = %source.display(), output = %target.display(), "CSV written");

        Ok(ItemOutcome::Written(target))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::detect::{PageRange, TableDetector, TableRegion};
    use crate::error::{DetectError, ReconcileError};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixed(Option<Vec<TableRegion>>);

    impl TableDetector for Fixed {
        fn detect(&self, document: &Path, _: PageRange) -> Result<Vec<TableRegion>, DetectError> {
            self.0
                .clone()
                .ok_or_else(|| DetectError::NoTables(document.to_path_buf()))
        }
    }

    fn step(dir: &Path, regions: Option<Vec<TableRegion>>) -> TransformStep {
        TransformStep::new(
            OutputCache::new(dir.join("csv")).unwrap(),
            TableReconciler::new(Arc::new(Fixed(regions))),
        )
    }

    fn sample() -> Vec<TableRegion> {
        vec![TableRegion::new(vec![
            vec!["Title".into(), "".into()],
            vec!["Number".into(), "Entity".into()],
            vec!["1".into(), "Dept".into()],
        ])]
    }

    #[tokio::test]
    async fn test_writes_then_reports_up_to_date() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("report.pdf");
        std::fs::write(&source, b"%PDF").unwrap();
        let step = step(tmp.path(), Some(sample()));

        let first = step.process(&QueueItem::new(&source)).await.unwrap();
        let target = tmp.path().join("csv").join("report.csv");
        assert_eq!(first, ItemOutcome::Written(target.clone()));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "Number,Entity\n1,Dept\n");

        let second = step.process(&QueueItem::new(&source)).await.unwrap();
        assert_eq!(second, ItemOutcome::UpToDate(target));
    }

    #[tokio::test]
    async fn test_missing_source() {
        let tmp = TempDir::new().unwrap();
        let step = step(tmp.path(), Some(sample()));

        let err = step
            .process(&QueueItem::new(tmp.path().join("absent.pdf")))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::MissingSource(_)));
    }

    #[tokio::test]
    async fn test_failure_leaves_no_artifact() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("scan.pdf");
        std::fs::write(&source, b"%PDF").unwrap();
        let step = step(tmp.path(), None);

        let err = step.process(&QueueItem::new(&source)).await.unwrap_err();
        assert!(matches!(
            err,
            TransformError::Reconcile(ReconcileError::Detection(DetectError::NoTables(_)))
        ));
        assert!(!tmp.path().join("csv").join("scan.csv").exists());
    }
}
