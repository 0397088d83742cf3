//! Bulk indexing results and cooperative cancellation.

use serde::Serialize;
use tokio::sync::watch;

use crate::error::{CoreError, ErrorKind};

/// Creates a linked cancellation handle and signal.
///
/// # Example
///
/// ```
/// use civreg_search::indexer::cancellation;
///
/// let (handle, signal) = cancellation();
/// assert!(!signal.is_cancelled());
/// handle.cancel();
/// assert!(signal.is_cancelled());
/// ```
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

/// Requests cancellation of a bulk operation.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Stops dispatch of further chunks. Chunks already submitted complete.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Observed by a bulk operation between chunks.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    /// Returns `true` once the paired handle has cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// A record that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    /// Tracking id of the record.
    pub record_id: String,
    /// Error kind; retryable kinds may succeed on a later attempt.
    pub kind: ErrorKind,
    /// Human-readable cause.
    pub reason: String,
}

impl BulkFailure {
    pub(crate) fn from_error(record_id: impl Into<String>, error: &CoreError) -> Self {
        Self {
            record_id: record_id.into(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Aggregate outcome of a bulk index call.
///
/// Records in chunks never dispatched because of cancellation appear in
/// neither list and are counted in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    /// Tracking ids written successfully.
    pub succeeded: Vec<String>,
    /// Records that failed, with reasons.
    pub failed: Vec<BulkFailure>,
    /// Whether dispatch stopped early.
    pub cancelled: bool,
    /// Chunks submitted to the backend.
    pub chunks_dispatched: usize,
    /// Records neither attempted nor failed.
    pub skipped: usize,
}

impl BulkSummary {
    /// Returns `true` if every record was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.cancelled && self.skipped == 0
    }

    /// Returns the failures a caller may retry.
    pub fn retryable(&self) -> impl Iterator<Item = &BulkFailure> {
        self.failed.iter().filter(|f| f.kind.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_signal_stays_clear() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_cloned_signals_observe_cancel() {
        let (handle, signal) = cancellation();
        let clone = signal.clone();
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_summary_retryable_filter() {
        let summary = BulkSummary {
            failed: vec![
                BulkFailure::from_error("A", &CoreError::write_failed("A", "rejected")),
                BulkFailure::from_error(
                    "B",
                    &crate::error::ValidationError::EmptyTrackingId.into(),
                ),
            ],
            ..Default::default()
        };
        let retryable: Vec<_> = summary.retryable().map(|f| f.record_id.as_str()).collect();
        assert_eq!(retryable, vec!["A"]);
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_summary_serializes_kind() {
        let failure = BulkFailure::from_error("A", &CoreError::write_failed("A", "bad"));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "index-write-failed");
    }
}
