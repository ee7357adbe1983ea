//! Background work queue for cache write-back and stale-entry removal
//!
//! Requests never wait on disk writes. Instead they submit a [`WorkItem`] and
//! move on. A single worker task drains the queue in submission order, so
//! writes from this process to the same path never interleave. Each
//! submission returns a [`WorkTicket`] that resolves when the item has been
//! handled; dropping the ticket is fine. [`WorkQueue::flush`] waits for
//! everything submitted before it.

use bytes::Bytes;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use super::disk::DiskBackend;
use super::CacheError;
use crate::metrics::PipelineMetrics;

/// A unit of deferred cache work
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// Persist a transformed image at its cache path
    Write { path: PathBuf, data: Bytes },
    /// Remove an entry observed stale
    Remove { path: PathBuf },
}

impl WorkItem {
    fn kind(&self) -> &'static str {
        match self {
            WorkItem::Write { .. } => "write",
            WorkItem::Remove { .. } => "remove",
        }
    }
}

struct Job {
    /// `None` is a barrier used by `flush`
    item: Option<WorkItem>,
    done: oneshot::Sender<Result<(), CacheError>>,
}

/// Completion handle for a submitted work item
#[derive(Debug)]
pub struct WorkTicket {
    rx: oneshot::Receiver<Result<(), CacheError>>,
}

impl WorkTicket {
    /// Wait for the item to be handled and return its outcome
    pub async fn wait(self) -> Result<(), CacheError> {
        self.rx.await.unwrap_or(Err(CacheError::QueueClosed))
    }
}

type PendingWorker = (mpsc::UnboundedReceiver<Job>, Arc<dyn DiskBackend>);

/// Handle for submitting work to the background worker
///
/// The worker task starts on the Tokio runtime of the first submission, so a
/// queue can be built before the server forks or creates its runtimes.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<Job>,
    pending: Arc<Mutex<Option<PendingWorker>>>,
}

impl WorkQueue {
    pub fn new(backend: Arc<dyn DiskBackend>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            pending: Arc::new(Mutex::new(Some((rx, backend)))),
        }
    }

    /// Start the worker if it is not running yet. Outside a runtime, items
    /// stay queued until a later call from inside one.
    fn ensure_started(&self) {
        let mut pending = self.pending.lock();
        if pending.is_none() {
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                if let Some((rx, backend)) = pending.take() {
                    handle.spawn(run_worker(rx, backend));
                    tracing::debug!("Cache work queue started");
                }
            }
            Err(_) => tracing::debug!("No runtime yet, cache work queue not started"),
        }
    }

    /// Queue an item without waiting for it
    pub fn submit(&self, item: WorkItem) -> WorkTicket {
        self.ensure_started();
        let (done, rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(job)) = self.tx.send(Job {
            item: Some(item),
            done,
        }) {
            tracing::warn!("Cache work queue closed, dropping work item");
            let _ = job.done.send(Err(CacheError::QueueClosed));
        }
        WorkTicket { rx }
    }

    /// Wait until every item submitted before this call has been handled
    pub async fn flush(&self) {
        self.ensure_started();
        let (done, rx) = oneshot::channel();
        if self.tx.send(Job { item: None, done }).is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Job>, backend: Arc<dyn DiskBackend>) {
    while let Some(job) = rx.recv().await {
        let result = match &job.item {
            None => Ok(()),
            Some(WorkItem::Write { path, data }) => {
                backend.write_file_atomic(path, data.clone()).await
            }
            Some(WorkItem::Remove { path }) => backend.delete_file(path).await,
        };

        if let (Some(item), Err(e)) = (&job.item, &result) {
            tracing::warn!(operation = item.kind(), error = %e, "Background cache work failed");
            PipelineMetrics::global().record_cache_work_failure(item.kind());
        }

        let _ = job.done.send(result);
    }
}
