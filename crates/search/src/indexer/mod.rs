//! Record indexing.
//!
//! The [`RecordIndexer`] turns records into [`IndexDocument`]s and writes
//! them to a [`SearchBackend`], one at a time or in chunked bulk calls.
//!
//! # Registration numbers
//!
//! A record that already carries a registration number keeps it, as does a
//! record the backend already holds a number for, even if its status no
//! longer issues one. A record whose status calls for one gets a candidate
//! from the [`RegistrationNumberGenerator`], which is then stored with the
//! backend's assign-if-absent write; whatever number the backend holds afterwards is
//! the one used. Concurrent indexers, in this process or another, therefore
//! agree on a single number per tracking id.
//!
//! # Document keys
//!
//! Documents are keyed by registration number, or by tracking id until one
//! is issued. Once a record is indexed under its registration number, the
//! provisional tracking-id document is removed.

mod bulk;
mod normalize;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{StreamExt, future, stream};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backend::SearchBackend;
use crate::chunk::create_chunks;
use crate::config::{CoreConfig, RetryConfig};
use crate::deadline::with_timeout;
use crate::error::{CoreError, CoreResult, Dependency};
use crate::identifier::{RegistrationNumber, RegistrationNumberGenerator};
use crate::types::{IndexDocument, Record};

pub use bulk::{BulkFailure, BulkSummary, CancelHandle, CancelSignal, cancellation};
pub use normalize::normalize;
pub use worker::{IndexWorker, RecordEvent, WorkerStats};

/// Outcome of one record inside a bulk call.
type RecordOutcome = (String, Result<(), BulkFailure>);

/// Writes records to the search index.
pub struct RecordIndexer {
    backend: Arc<dyn SearchBackend>,
    generator: RegistrationNumberGenerator,
    chunk_limit: usize,
    concurrency: usize,
    timeout: Duration,
}

impl std::fmt::Debug for RecordIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordIndexer")
            .field("backend", &self.backend.name())
            .field("chunk_limit", &self.chunk_limit)
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RecordIndexer {
    /// Creates an indexer with chunking, concurrency, and timeout from `config`.
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        generator: RegistrationNumberGenerator,
        config: &CoreConfig,
    ) -> Self {
        Self {
            backend,
            generator,
            chunk_limit: config.index_chunk_limit,
            concurrency: config.bulk_concurrency.max(1),
            timeout: config.backend_timeout(),
        }
    }

    /// Returns the backend this indexer writes to.
    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    /// Indexes a single record, replacing any previous document for it.
    ///
    /// # Errors
    ///
    /// * `IndexWriteFailed` - the backend rejected the document
    /// * `DependencyUnavailable` / `DependencyTimeout` - the backend failed
    /// * `InvalidArgument` - the record cannot be given a registration number
    pub async fn index_record(&self, record: &Record) -> CoreResult<IndexDocument> {
        let number = self.resolve_number(record).await?;
        let document = normalize(record, number, Utc::now());

        with_timeout(
            Dependency::SearchBackend,
            self.timeout,
            self.backend.upsert(&document),
        )
        .await?;
        self.remove_provisional(&document).await?;

        debug!(
            tracking_id = %document.tracking_id,
            key = %document.key,
            "Indexed record"
        );
        Ok(document)
    }

    /// Indexes a record, retrying retryable failures with exponential backoff.
    pub async fn index_record_with_retry(
        &self,
        record: &Record,
        retry: &RetryConfig,
    ) -> CoreResult<IndexDocument> {
        let mut delay = retry.initial_delay();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.index_record(record).await {
                Ok(document) => {
                    if attempts > 1 {
                        debug!(attempts = attempts, "Index succeeded after retries");
                    }
                    return Ok(document);
                }
                Err(e) => {
                    if !e.kind().is_retryable() || attempts > retry.max_retries {
                        return Err(e);
                    }

                    warn!(
                        tracking_id = %record.tracking_id(),
                        attempt = attempts,
                        max_retries = retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Index attempt failed, retrying"
                    );

                    sleep(delay).await;
                    delay = retry.next_delay(delay);
                }
            }
        }
    }

    /// Indexes many records in chunks of `index_chunk_limit`, with up to
    /// `bulk_concurrency` chunks in flight.
    ///
    /// Failures are reported per record in the summary; one failing chunk
    /// never stops the others. `cancel` is checked before each chunk is
    /// dispatched. Chunks already submitted are not rolled back.
    pub async fn bulk_index(
        &self,
        records: Vec<Record>,
        cancel: CancelSignal,
    ) -> CoreResult<BulkSummary> {
        let total = records.len();
        let mut summary = BulkSummary::default();

        let prepared: Vec<Result<IndexDocument, BulkFailure>> = stream::iter(records)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|record| async move {
                match self.resolve_number(&record).await {
                    Ok(number) => Ok(normalize(&record, number, Utc::now())),
                    Err(e) => Err(BulkFailure::from_error(record.tracking_id(), &e)),
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut documents = Vec::with_capacity(prepared.len());
        for result in prepared {
            match result {
                Ok(document) => documents.push(document),
                Err(failure) => summary.failed.push(failure),
            }
        }

        let chunks = create_chunks(documents, self.chunk_limit)?;
        let chunk_count = chunks.len();

        let outcomes: Vec<Vec<RecordOutcome>> = stream::iter(chunks.into_iter().enumerate())
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|(position, chunk)| self.write_chunk(position, chunk))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        summary.chunks_dispatched = outcomes.len();
        for (record_id, outcome) in outcomes.into_iter().flatten() {
            match outcome {
                Ok(()) => summary.succeeded.push(record_id),
                Err(failure) => summary.failed.push(failure),
            }
        }

        summary.skipped = total
            .saturating_sub(summary.succeeded.len())
            .saturating_sub(summary.failed.len());
        summary.cancelled = cancel.is_cancelled()
            && (summary.chunks_dispatched < chunk_count || summary.skipped > 0);

        info!(
            records = total,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped,
            chunks = summary.chunks_dispatched,
            cancelled = summary.cancelled,
            "Bulk index finished"
        );
        Ok(summary)
    }

    /// Writes one chunk and reports an outcome for every document in it.
    async fn write_chunk(&self, position: usize, chunk: Vec<IndexDocument>) -> Vec<RecordOutcome> {
        let result = with_timeout(
            Dependency::SearchBackend,
            self.timeout,
            self.backend.bulk_upsert(&chunk),
        )
        .await;

        let items = match result {
            Ok(items) => items,
            Err(e) => {
                warn!(chunk = position, size = chunk.len(), error = %e, "Bulk chunk failed");
                return chunk
                    .into_iter()
                    .map(|doc| {
                        let failure = BulkFailure::from_error(&doc.tracking_id, &e);
                        (doc.tracking_id, Err(failure))
                    })
                    .collect();
            }
        };

        let mut outcomes = Vec::with_capacity(chunk.len());
        for (offset, doc) in chunk.iter().enumerate() {
            let item = items.get(offset).filter(|item| item.key == doc.key);
            let outcome = match item.map(|item| item.error.as_deref()) {
                Some(None) => self
                    .remove_provisional(doc)
                    .await
                    .map_err(|e| BulkFailure::from_error(&doc.tracking_id, &e)),
                Some(Some(reason)) => Err(BulkFailure::from_error(
                    &doc.tracking_id,
                    &CoreError::write_failed(&doc.tracking_id, reason),
                )),
                None => Err(BulkFailure::from_error(
                    &doc.tracking_id,
                    &CoreError::write_failed(&doc.tracking_id, "no outcome reported by backend"),
                )),
            };
            outcomes.push((doc.tracking_id.clone(), outcome));
        }

        debug!(chunk = position, size = chunk.len(), "Bulk chunk written");
        outcomes
    }

    /// Returns the number to key this record under.
    ///
    /// A number once issued is kept whatever the record's later status, so
    /// the record stays under one key. Otherwise one is issued only if the
    /// status requires it.
    async fn resolve_number(&self, record: &Record) -> CoreResult<Option<RegistrationNumber>> {
        if let Some(number) = record.registration_number() {
            return Ok(Some(number.clone()));
        }

        let stored = with_timeout(
            Dependency::SearchBackend,
            self.timeout,
            self.backend.assigned_number(record.tracking_id()),
        )
        .await?;
        if let Some(number) = stored {
            debug!(
                tracking_id = %record.tracking_id(),
                number = %number,
                "Keeping previously issued registration number"
            );
            return Ok(Some(number));
        }

        if !record.status().issues_registration_number() {
            return Ok(None);
        }

        let candidate = self.generator.generate(record.tracking_id()).await?;
        let issued = with_timeout(
            Dependency::SearchBackend,
            self.timeout,
            self.backend
                .assign_if_absent(record.tracking_id(), candidate.clone()),
        )
        .await?;

        if issued != candidate {
            debug!(
                tracking_id = %record.tracking_id(),
                number = %issued,
                "Reusing previously issued registration number"
            );
        } else {
            info!(
                tracking_id = %record.tracking_id(),
                number = %issued,
                "Issued registration number"
            );
        }
        Ok(Some(issued))
    }

    async fn remove_provisional(&self, document: &IndexDocument) -> CoreResult<()> {
        if !document.supersedes_provisional() {
            return Ok(());
        }
        let key = IndexDocument::provisional_key(&document.tracking_id);
        let removed = with_timeout(
            Dependency::SearchBackend,
            self.timeout,
            self.backend.delete(key),
        )
        .await?;
        if removed {
            debug!(tracking_id = %document.tracking_id, "Removed provisional document");
        }
        Ok(())
    }
}
