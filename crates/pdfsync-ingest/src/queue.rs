//! FIFO hand-off between the fetch stage and the transform workers
//!
//! One producer pushes local paths, any number of consumers pop them. Every popped
//! item is handed out as a [`Delivery`] that counts as acknowledged when dropped, so
//! [`TaskQueue::join`] can wait for "closed and fully processed" rather than just
//! "closed and empty".

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::debug;

/// A document waiting to be transformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub local_path: PathBuf,
}

impl QueueItem {
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("queue is closed")]
pub struct QueueClosed(pub QueueItem);

#[derive(Debug, Clone, Copy, Default)]
struct QueueState {
    /// Pushed but not yet acknowledged
    pending: usize,
    closed: bool,
}

enum Tx {
    Bounded(mpsc::Sender<QueueItem>),
    Unbounded(mpsc::UnboundedSender<QueueItem>),
}

enum Rx {
    Bounded(mpsc::Receiver<QueueItem>),
    Unbounded(mpsc::UnboundedReceiver<QueueItem>),
}

impl Rx {
    async fn recv(&mut self) -> Option<QueueItem> {
        match self {
            Rx::Bounded(rx) => rx.recv().await,
            Rx::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// Multi-consumer task queue with drain tracking
pub struct TaskQueue {
    tx: Mutex<Option<Tx>>,
    rx: AsyncMutex<Rx>,
    state: Arc<watch::Sender<QueueState>>,
}

impl TaskQueue {
    /// Queue holding at most `capacity` undelivered items; `push` waits when full.
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self::from_parts(Tx::Bounded(tx), Rx::Bounded(rx))
    }

    pub fn unbounded() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self::from_parts(Tx::Unbounded(tx), Rx::Unbounded(rx))
    }

    /// `0` means unbounded
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            Self::unbounded()
        } else {
            Self::bounded(capacity)
        }
    }

    fn from_parts(tx: Tx, rx: Rx) -> Self {
        let (state, _) = watch::channel(QueueState::default());
        Self {
            tx: Mutex::new(Some(tx)),
            rx: AsyncMutex::new(rx),
            state: Arc::new(state),
        }
    }

    /// Submit an item. Fails once [`close`](Self::close) has been called.
    pub async fn push(&self, item: QueueItem) -> Result<(), QueueClosed> {
        let sender = {
            let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.as_ref() {
                Some(Tx::Bounded(tx)) => Some(Tx::Bounded(tx.clone())),
                Some(Tx::Unbounded(tx)) => Some(Tx::Unbounded(tx.clone())),
                None => None,
            }
        };

        let Some(sender) = sender else {
            return Err(QueueClosed(item));
        };

        // Count the item before it becomes visible to consumers.
        match sender {
            Tx::Bounded(tx) => match tx.reserve().await {
                Ok(permit) => {
                    self.state.send_modify(|s| s.pending += 1);
                    permit.send(item);
                    Ok(())
                },
                Err(_) => Err(QueueClosed(item)),
            },
            Tx::Unbounded(tx) => {
                self.state.send_modify(|s| s.pending += 1);
                tx.send(item).map_err(|e| {
                    self.state.send_modify(|s| s.pending = s.pending.saturating_sub(1));
                    QueueClosed(e.0)
                })
            },
        }
    }

    /// Signal that no more items will be pushed. Consumers still receive what is queued.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.state.send_modify(|s| s.closed = true);
    }

    /// Next item in FIFO order, or `None` once the queue is closed and empty.
    pub async fn pop(&self) -> Option<Delivery> {
        let item = self.rx.lock().await.recv().await?;
        Some(Delivery {
            item,
            state: Arc::clone(&self.state),
        })
    }

    /// Wait until the queue is closed and every pushed item has been acknowledged.
    pub async fn join(&self) {
        let mut state = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        if let Err(e) = state.wait_for(|s| s.closed && s.pending == 0).await {
            debug!(error = %e, "Queue state channel closed while joining");
        };
    }

    /// Items pushed but not yet acknowledged
    pub fn pending(&self) -> usize {
        self.state.borrow().pending
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

/// A popped item; dropping it marks the item as done.
#[derive(Debug)]
pub struct Delivery {
    item: QueueItem,
    state: Arc<watch::Sender<QueueState>>,
}

impl Delivery {
    pub fn item(&self) -> &QueueItem {
        &self.item
    }
}

impl Deref for Delivery {
    type Target = QueueItem;

    fn deref(&self) -> &QueueItem {
        &self.item
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.state
            .send_modify(|s| s.pending = s.pending.saturating_sub(1));
    }
}
