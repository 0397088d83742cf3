//! Background indexing of record events from the system of record.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::RetryConfig;
use crate::types::Record;

use super::RecordIndexer;

/// A change published by the system of record.
#[derive(Debug, Clone)]
pub enum RecordEvent {
    /// A record was finalized for the first time.
    Finalized(Record),
    /// A previously finalized record changed.
    Updated(Record),
}

impl RecordEvent {
    /// Returns the record carried by this event.
    pub fn record(&self) -> &Record {
        match self {
            RecordEvent::Finalized(record) | RecordEvent::Updated(record) => record,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RecordEvent::Finalized(_) => "finalized",
            RecordEvent::Updated(_) => "updated",
        }
    }
}

/// Counters for a running [`IndexWorker`].
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Events received.
    pub received: u64,
    /// Events indexed successfully.
    pub indexed: u64,
    /// Events that failed after all retries.
    pub failed: u64,
    /// When the last event was indexed.
    pub last_success: Option<Instant>,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

/// Consumes [`RecordEvent`]s and indexes each one with retries.
///
/// The worker stops when every sender for its channel has been dropped.
#[derive(Debug)]
pub struct IndexWorker {
    stats: Arc<RwLock<WorkerStats>>,
    handle: JoinHandle<()>,
}

impl IndexWorker {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(
        indexer: Arc<RecordIndexer>,
        receiver: mpsc::Receiver<RecordEvent>,
        retry: RetryConfig,
    ) -> Self {
        let stats = Arc::new(RwLock::new(WorkerStats::default()));
        let handle = tokio::spawn(Self::run(indexer, receiver, retry, stats.clone()));
        Self { stats, handle }
    }

    async fn run(
        indexer: Arc<RecordIndexer>,
        mut receiver: mpsc::Receiver<RecordEvent>,
        retry: RetryConfig,
        stats: Arc<RwLock<WorkerStats>>,
    ) {
        info!("Index worker started");

        while let Some(event) = receiver.recv().await {
            stats.write().received += 1;
            let record = event.record();

            let result = indexer.index_record_with_retry(record, &retry).await;

            let mut counters = stats.write();
            match result {
                Ok(document) => {
                    counters.indexed += 1;
                    counters.last_success = Some(Instant::now());
                    debug!(
                        event = event.label(),
                        tracking_id = %record.tracking_id(),
                        key = %document.key,
                        "Indexed record event"
                    );
                }
                Err(e) => {
                    counters.failed += 1;
                    counters.last_error = Some(e.to_string());
                    error!(
                        event = event.label(),
                        tracking_id = %record.tracking_id(),
                        kind = %e.kind(),
                        error = %e,
                        "Record event could not be indexed"
                    );
                }
            }
        }

        info!("Index worker stopped: channel closed");
    }

    /// Returns a snapshot of the worker's counters.
    pub fn stats(&self) -> WorkerStats {
        self.stats.read().clone()
    }

    /// Returns `true` once the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker to drain its channel and exit.
    pub async fn join(self) -> WorkerStats {
        if let Err(e) = self.handle.await {
            error!(error = %e, "Index worker task failed");
        }
        self.stats.read().clone()
    }
}
