//! Bulk indexing from newline-delimited JSON.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use civreg_search::RegistrySearchService;
use civreg_search::config::RetryConfig;
use civreg_search::indexer::{BulkSummary, cancellation};
use civreg_search::types::Record;

/// A line of the input that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidLine {
    /// 1-based line number.
    pub line: usize,
    /// Why it was rejected.
    pub reason: String,
}

/// Records parsed from an NDJSON file.
#[derive(Debug, Default)]
pub struct RecordFile {
    pub records: Vec<Record>,
    pub invalid: Vec<InvalidLine>,
}

/// What a backfill run did.
#[derive(Debug, Default, Serialize)]
pub struct BackfillReport {
    /// Records parsed from the input.
    pub records_read: usize,
    /// Lines skipped before indexing.
    pub invalid_lines: Vec<InvalidLine>,
    /// Outcome of the bulk call.
    pub summary: BulkSummary,
    /// Tracking ids that failed in bulk and succeeded on retry.
    pub recovered: Vec<String>,
}

impl BackfillReport {
    /// Failures left after retries.
    pub fn remaining_failures(&self) -> usize {
        self.summary.failed.len()
    }

    /// Returns `true` if every input line ended up indexed.
    pub fn is_clean(&self) -> bool {
        self.invalid_lines.is_empty() && self.summary.is_complete()
    }
}

/// Reads records from `path`, one JSON object per line.
///
/// Blank lines are ignored. Lines that are not valid JSON or not valid
/// records are reported rather than aborting the read.
pub fn read_records(path: &Path) -> anyhow::Result<RecordFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut file = RecordFile::default();
    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let parsed = serde_json::from_str::<Value>(line)
            .map_err(|e| e.to_string())
            .and_then(|value| Record::from_json(value).map_err(|e| e.to_string()));
        match parsed {
            Ok(record) => file.records.push(record),
            Err(reason) => {
                warn!(line = line_number, reason = %reason, "Skipping invalid input line");
                file.invalid.push(InvalidLine {
                    line: line_number,
                    reason,
                });
            }
        }
    }
    Ok(file)
}

/// Indexes every record in `path`.
///
/// Ctrl-C stops dispatch of further chunks; chunks already sent still
/// complete. Records that failed with a transient error are retried one at
/// a time unless `retry` is `None`.
pub async fn run(
    service: &RegistrySearchService,
    token: &str,
    path: &Path,
    retry: Option<&RetryConfig>,
) -> anyhow::Result<BackfillReport> {
    let file = read_records(path)?;
    info!(
        path = %path.display(),
        records = file.records.len(),
        invalid = file.invalid.len(),
        "Starting backfill"
    );

    let (handle, signal) = cancellation();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, no further chunks will be dispatched");
            handle.cancel();
        }
    });

    let records_read = file.records.len();
    let result = service
        .bulk_index(token, file.records.clone(), signal)
        .await;
    interrupt.abort();
    let mut summary = result.context("Bulk index was refused")?;

    let mut recovered = Vec::new();
    if let Some(retry) = retry
        && !summary.cancelled
        && summary.retryable().next().is_some()
    {
        recovered = retry_failures(service, token, &file.records, &mut summary, retry).await;
    }

    Ok(BackfillReport {
        records_read,
        invalid_lines: file.invalid,
        summary,
        recovered,
    })
}

/// Retries each retryable failure individually, removing recovered records
/// from `summary.failed`.
///
/// The token is checked again before each record, since it may have been
/// revoked during a long run. When the input holds several snapshots of one
/// record, the last one is retried.
async fn retry_failures(
    service: &RegistrySearchService,
    token: &str,
    records: &[Record],
    summary: &mut BulkSummary,
    retry: &RetryConfig,
) -> Vec<String> {
    let mut pending: Vec<String> = Vec::new();
    for failure in summary.retryable() {
        if !pending.contains(&failure.record_id) {
            pending.push(failure.record_id.clone());
        }
    }
    info!(records = pending.len(), "Retrying transient failures");

    let mut recovered = Vec::new();
    for record_id in pending {
        if let Err(e) = service.validator().authorize(token).await {
            warn!(error = %e, "Token no longer accepted, abandoning retries");
            break;
        }

        let Some(record) = records.iter().rev().find(|r| r.tracking_id() == record_id) else {
            continue;
        };
        match service.indexer().index_record_with_retry(record, retry).await {
            Ok(_) => {
                summary.failed.retain(|f| f.record_id != record_id);
                summary.succeeded.push(record_id.clone());
                recovered.push(record_id);
            }
            Err(e) => {
                warn!(tracking_id = %record_id, error = %e, "Record still failing after retries");
            }
        }
    }
    recovered
}
