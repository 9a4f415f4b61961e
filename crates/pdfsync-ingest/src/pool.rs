//! Worker pool draining the task queue
//!
//! Each worker pops items until the queue is closed and empty. A failing or panicking
//! item is logged and counted; the worker moves on to the next one.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::TransformError;
use crate::queue::{QueueItem, TaskQueue};

/// Result of processing one queued item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A new output artifact was written
    Written(PathBuf),
    /// The existing output artifact is current
    UpToDate(PathBuf),
}

/// Work done for each queued item
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: &QueueItem) -> Result<ItemOutcome, TransformError>;
}

/// Totals across all workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub processed: usize,
    pub written: usize,
    pub up_to_date: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    processed: AtomicUsize,
    written: AtomicUsize,
    up_to_date: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> PoolStats {
        PoolStats {
            processed: self.processed.load(Ordering::Acquire),
            written: self.written.load(Ordering::Acquire),
            up_to_date: self.up_to_date.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

/// Fixed set of workers consuming one [`TaskQueue`]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Spawn `workers` tasks on the current tokio runtime.
    pub fn start(workers: usize, queue: Arc<TaskQueue>, processor: Arc<dyn ItemProcessor>) -> Self {
        let counters = Arc::new(Counters::default());

        let handles = (0..workers.max(1))
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let processor = Arc::clone(&processor);
                let counters = Arc::clone(&counters);
                tokio::spawn(async move { run_worker(worker, queue, processor, counters).await })
            })
            .collect::<Vec<_>>();

        info!(workers = handles.len(), "Worker pool started");
        Self { handles, counters }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Current totals
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Abort any worker still running and return the totals.
    ///
    /// Call after [`TaskQueue::join`]; no item is in flight at that point.
    pub async fn stop(self) -> PoolStats {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Worker task ended abnormally");
                }
            }
        }

        let stats = self.counters.snapshot();
        info!(
            processed = stats.processed,
            written = stats.written,
            up_to_date = stats.up_to_date,
            failed = stats.failed,
            "Worker pool stopped"
        );
        stats
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<TaskQueue>,
    processor: Arc<dyn ItemProcessor>,
    counters: Arc<Counters>,
) {
    debug!(worker, "Worker waiting for items");

    while let Some(delivery) = queue.pop().await {
        let path = delivery.local_path.display().to_string();
        let result = AssertUnwindSafe(processor.process(delivery.item()))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(ItemOutcome::Written(output))) => {
                debug!(worker, path = %path, output = %output.display(), "Item written");
                counters.written.fetch_add(1, Ordering::AcqRel);
            },
            Ok(Ok(ItemOutcome::UpToDate(_))) => {
                counters.up_to_date.fetch_add(1, Ordering::AcqRel);
            },
            Ok(Err(e)) => {
                error!(worker, path = %path, error = %e, "Error processing");
                counters.failed.fetch_add(1, Ordering::AcqRel);
            },
            Err(panic) => {
                error!(worker, path = %path, panic = %panic_message(&*panic), "Processing panicked");
                counters.failed.fetch_add(1, Ordering::AcqRel);
            },
        }
        counters.processed.fetch_add(1, Ordering::AcqRel);

        // Acknowledge only after the counters reflect this item.
        drop(delivery);
    }

    debug!(worker, "Queue closed, worker exiting");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails on names containing "bad", panics on "boom", records the rest
    #[derive(Default)]
    struct Scripted {
        seen: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ItemProcessor for Scripted {
        async fn process(&self, item: &QueueItem) -> Result<ItemOutcome, TransformError> {
            let name = item.local_path.to_string_lossy().to_string();
            tokio::time::sleep(Duration::from_millis(5)).await;
            if name.contains("boom") {
                panic!("detector crashed on {}", name);
            }
            if name.contains("bad") {
                return Err(TransformError::MissingSource(item.local_path.clone()));
            }
            self.seen.lock().unwrap().push(item.local_path.clone());
            if name.contains("old") {
                Ok(ItemOutcome::UpToDate(item.local_path.clone()))
            } else {
                Ok(ItemOutcome::Written(item.local_path.clone()))
            }
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_pool() {
        let queue = Arc::new(TaskQueue::unbounded());
        let processor = Arc::new(Scripted::default());
        let pool = WorkerPool::start(2, Arc::clone(&queue), processor.clone());
        assert_eq!(pool.size(), 2);

        for name in ["a.pdf", "bad.pdf", "boom.pdf", "old.pdf", "c.pdf", "bad2.pdf", "d.pdf"] {
            queue.push(QueueItem::new(name)).await.unwrap();
        }
        queue.close();

        tokio::time::timeout(Duration::from_secs(5), queue.join())
            .await
            .expect("queue should drain");
        let stats = pool.stop().await;

        assert_eq!(
            stats,
            PoolStats {
                processed: 7,
                written: 3,
                up_to_date: 1,
                failed: 3,
            }
        );

        let mut seen = processor.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                PathBuf::from("a.pdf"),
                PathBuf::from("c.pdf"),
                PathBuf::from("d.pdf"),
                PathBuf::from("old.pdf"),
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_idle_pool() {
        let queue = Arc::new(TaskQueue::unbounded());
        let pool = WorkerPool::start(3, Arc::clone(&queue), Arc::new(Scripted::default()));

        // Workers blocked on an open, empty queue are aborted
        let stats = tokio::time::timeout(Duration::from_secs(1), pool.stop())
            .await
            .unwrap();
        assert_eq!(stats, PoolStats::default());
    }
}
