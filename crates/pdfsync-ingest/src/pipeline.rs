//! End-to-end run: discover, fetch, transform, archive
//!
//! The driver task is the only producer. It fetches each URL in discovery order and
//! queues the local copy; the worker pool transforms queued documents concurrently.
//! Once every URL has been handled the queue is closed, drained and the pool stopped
//! before the output directory is archived.

use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::archive::build_archive;
use crate::config::IngestConfig;
use crate::detect::TableDetector;
use crate::discovery::SourceDiscovery;
use crate::error::{FetchError, Result};
use crate::fetch::{FetchCache, FetchOutcome};
use crate::output::OutputCache;
use crate::pool::WorkerPool;
use crate::queue::{QueueItem, TaskQueue};
use crate::reconcile::TableReconciler;
use crate::transform::TransformStep;

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// URLs returned by discovery
    pub discovered: usize,
    /// Sources fetched over the network this run
    pub downloaded: usize,
    /// Sources whose cached copy was already current
    pub cached: usize,
    /// Sources whose download failed but had an earlier copy
    pub reused: usize,
    /// Sources skipped because the metadata request failed
    pub unavailable: usize,
    /// Other fetch failures, including downloads with no copy to fall back on
    pub fetch_failed: usize,
    /// Output artifacts written this run
    pub written: usize,
    /// Output artifacts that were already current
    pub up_to_date: usize,
    /// Documents that could not be transformed
    pub failed: usize,
    pub archive_path: PathBuf,
    pub archive_entries: usize,
}

impl RunReport {
    /// Documents handed to the workers
    pub fn queued(&self) -> usize {
        self.downloaded + self.cached + self.reused
    }
}

/// HTTP client carrying the configured timeout and user agent
pub fn http_client(config: &IngestConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(config.timeout())
        .user_agent(&config.user_agent)
        .build()?)
}

/// One configured pipeline
pub struct Pipeline {
    config: IngestConfig,
    client: Client,
    discovery: Arc<dyn SourceDiscovery>,
    detector: Arc<dyn TableDetector>,
}

impl Pipeline {
    pub fn new(
        config: IngestConfig,
        discovery: Arc<dyn SourceDiscovery>,
        detector: Arc<dyn TableDetector>,
    ) -> Result<Self> {
        config.validate()?;
        let client = http_client(&config)?;

        Ok(Self {
            config,
            client,
            discovery,
            detector,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run once.
    ///
    /// Only directory setup, discovery and archiving can fail the run. Per-document
    /// failures are logged and counted in the report.
    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport {
            archive_path: self.config.archive_path.clone(),
            ..RunReport::default()
        };

        let fetch = FetchCache::new(self.client.clone(), &self.config.cache_dir)?;
        let output = OutputCache::new(&self.config.output_dir)?;

        let urls = self.discovery.discover().await?;
        report.discovered = urls.len();
        info!(count = urls.len(), "Discovered source documents");

        let queue = Arc::new(TaskQueue::with_capacity(self.config.queue_capacity));
        let step = TransformStep::new(output, TableReconciler::new(Arc::clone(&self.detector)));
        let pool = WorkerPool::start(self.config.workers, Arc::clone(&queue), Arc::new(step));

        let mut claimed: HashMap<PathBuf, String> = HashMap::new();

        for url in &urls {
            if let Some(path) = fetch.local_path_for(url) {
                if let Some(previous) = claimed.get(&path) {
                    warn!(
                        url = %url,
                        previous = %previous,
                        path = %path.display(),
                        "Two sources share one cache file"
                    );
                } else {
                    claimed.insert(path, url.clone());
                }
            }

            let outcome = match fetch.ensure_local(url).await {
                Ok(outcome) => outcome,
                Err(e @ FetchError::Unavailable { .. }) => {
                    warn!(url = %url, error = %e, "Skipping source");
                    report.unavailable += 1;
                    continue;
                },
                Err(e) => {
                    error!(url = %url, error = %e, "Fetch failed");
                    report.fetch_failed += 1;
                    continue;
                },
            };

            match &outcome {
                FetchOutcome::Downloaded(_) => report.downloaded += 1,
                FetchOutcome::UpToDate(_) => report.cached += 1,
                FetchOutcome::Reused(_) => report.reused += 1,
            }

            if let Err(e) = queue.push(QueueItem::new(outcome.into_local_path())).await {
                error!(path = %e.0.local_path.display(), "Queue closed before all sources were queued");
            }
        }

        queue.close();
        queue.join().await;
        let stats = pool.stop().await;
        report.written = stats.written;
        report.up_to_date = stats.up_to_date;
        report.failed = stats.failed;

        let output_dir = self.config.output_dir.clone();
        let archive_path = self.config.archive_path.clone();
        report.archive_entries =
            tokio::task::spawn_blocking(move || build_archive(&output_dir, &archive_path)).await??;

        info!(
            discovered = report.discovered,
            downloaded = report.downloaded,
            cached = report.cached,
            reused = report.reused,
            unavailable = report.unavailable,
            fetch_failed = report.fetch_failed,
            written = report.written,
            up_to_date = report.up_to_date,
            failed = report.failed,
            archive_entries = report.archive_entries,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run complete"
        );

        Ok(report)
    }
}
