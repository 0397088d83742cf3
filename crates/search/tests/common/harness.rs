//! Instrumented backends and stores for fault injection and call counting.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use civreg_search::auth::{InvalidationStore, MemoryInvalidationStore};
use civreg_search::backend::{
    BackendHits, BackendQuery, BulkItemOutcome, MemorySearchBackend, SearchBackend,
};
use civreg_search::config::{CoreConfig, RetryConfig};
use civreg_search::error::{CoreError, CoreResult, Dependency};
use civreg_search::identifier::{Clock, RegistrationNumber};
use civreg_search::indexer::CancelHandle;
use civreg_search::types::IndexDocument;
use civreg_search::RegistrySearchService;

/// How the instrumented backend misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultMode {
    /// Behave normally.
    #[default]
    Healthy,
    /// Every call fails as unreachable.
    Unavailable,
    /// Every call never completes.
    Hang,
}

/// Per-operation call counts.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub upsert: AtomicUsize,
    pub bulk_upsert: AtomicUsize,
    pub delete: AtomicUsize,
    pub query: AtomicUsize,
    pub lookup: AtomicUsize,
    pub assign: AtomicUsize,
}

/// A [`MemorySearchBackend`] with call counting and fault injection.
#[derive(Default)]
pub struct InstrumentedBackend {
    pub inner: MemorySearchBackend,
    pub calls: CallCounts,
    mode: Mutex<FaultMode>,
    poisoned: Mutex<HashSet<String>>,
    failing_upserts: AtomicUsize,
    failing_bulk_call: Mutex<Option<usize>>,
    cancel_after_bulk: Mutex<Option<(usize, CancelHandle)>>,
}

impl InstrumentedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_mode(&self, mode: FaultMode) {
        *self.mode.lock() = mode;
    }

    /// Rejects every document for `tracking_id`.
    pub fn poison(&self, tracking_id: &str) {
        self.poisoned.lock().insert(tracking_id.to_string());
    }

    /// Fails the next `count` single upserts as unreachable.
    pub fn fail_next_upserts(&self, count: usize) {
        self.failing_upserts.store(count, Ordering::SeqCst);
    }

    /// Fails the `call`-th bulk call (1-based) as unreachable.
    pub fn fail_bulk_call(&self, call: usize) {
        *self.failing_bulk_call.lock() = Some(call);
    }

    /// Cancels `handle` once `calls` bulk calls have completed.
    pub fn cancel_after_bulk_calls(&self, calls: usize, handle: CancelHandle) {
        *self.cancel_after_bulk.lock() = Some((calls, handle));
    }

    pub fn query_calls(&self) -> usize {
        self.calls.query.load(Ordering::SeqCst)
    }

    pub fn bulk_calls(&self) -> usize {
        self.calls.bulk_upsert.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.calls.upsert.load(Ordering::SeqCst)
    }

    async fn fault(&self) -> CoreResult<()> {
        let mode = *self.mode.lock();
        match mode {
            FaultMode::Healthy => Ok(()),
            FaultMode::Unavailable => Err(CoreError::unavailable(
                Dependency::SearchBackend,
                "connection refused",
            )),
            FaultMode::Hang => std::future::pending().await,
        }
    }

    fn is_poisoned(&self, tracking_id: &str) -> bool {
        self.poisoned.lock().contains(tracking_id)
    }
}

#[async_trait]
impl SearchBackend for InstrumentedBackend {
    fn name(&self) -> &'static str {
        "instrumented"
    }

    async fn upsert(&self, document: &IndexDocument) -> CoreResult<()> {
        self.calls.upsert.fetch_add(1, Ordering::SeqCst);
        self.fault().await?;

        let remaining = self.failing_upserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_upserts.store(remaining - 1, Ordering::SeqCst);
            return Err(CoreError::unavailable(
                Dependency::SearchBackend,
                "connection reset",
            ));
        }

        if self.is_poisoned(&document.tracking_id) {
            return Err(CoreError::write_failed(
                &document.tracking_id,
                "mapper_parsing_exception",
            ));
        }
        self.inner.upsert(document).await
    }

    async fn bulk_upsert(&self, documents: &[IndexDocument]) -> CoreResult<Vec<BulkItemOutcome>> {
        let call = self.calls.bulk_upsert.fetch_add(1, Ordering::SeqCst) + 1;
        self.fault().await?;

        let drop_this_call = *self.failing_bulk_call.lock() == Some(call);
        let result = if drop_this_call {
            Err(CoreError::unavailable(
                Dependency::SearchBackend,
                "bulk request dropped",
            ))
        } else {
            let mut outcomes = Vec::with_capacity(documents.len());
            for doc in documents {
                if self.is_poisoned(&doc.tracking_id) {
                    outcomes.push(BulkItemOutcome::rejected(&doc.key, "mapper_parsing_exception"));
                } else {
                    self.inner.upsert(doc).await?;
                    outcomes.push(BulkItemOutcome::ok(&doc.key));
                }
            }
            Ok(outcomes)
        };

        let mut cancel = self.cancel_after_bulk.lock();
        if let Some((after, handle)) = cancel.as_ref()
            && call >= *after
        {
            handle.cancel();
            *cancel = None;
        }
        result
    }

    async fn delete(&self, key: &str) -> CoreResult<bool> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.fault().await?;
        self.inner.delete(key).await
    }

    async fn query(&self, query: &BackendQuery) -> CoreResult<BackendHits> {
        self.calls.query.fetch_add(1, Ordering::SeqCst);
        self.fault().await?;
        self.inner.query(query).await
    }

    async fn assigned_number(&self, tracking_id: &str) -> CoreResult<Option<RegistrationNumber>> {
        self.calls.lookup.fetch_add(1, Ordering::SeqCst);
        self.fault().await?;
        self.inner.assigned_number(tracking_id).await
    }

    async fn assign_if_absent(
        &self,
        tracking_id: &str,
        candidate: RegistrationNumber,
    ) -> CoreResult<RegistrationNumber> {
        self.calls.assign.fetch_add(1, Ordering::SeqCst);
        self.fault().await?;
        // Let a concurrent caller generate its own candidate first.
        tokio::task::yield_now().await;
        self.inner.assign_if_absent(tracking_id, candidate).await
    }
}

/// An invalidation store that counts lookups.
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: MemoryInvalidationStore,
    pub lookups: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn revoke(&self, namespace: &str, token: &str) {
        self.inner.invalidate_token(namespace, token);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InvalidationStore for CountingStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }
}

/// An invalidation store that is always down.
#[derive(Debug, Default)]
pub struct UnreachableStore;

#[async_trait]
impl InvalidationStore for UnreachableStore {
    async fn get(&self, _key: &str) -> CoreResult<Option<String>> {
        Err(CoreError::unavailable(
            Dependency::InvalidationStore,
            "connection refused",
        ))
    }
}

/// An invalidation store that never answers.
#[derive(Debug, Default)]
pub struct HangingStore;

#[async_trait]
impl InvalidationStore for HangingStore {
    async fn get(&self, _key: &str) -> CoreResult<Option<String>> {
        std::future::pending().await
    }
}

/// A clock fixed at mid-year of `year`.
pub struct YearClock(pub i32);

impl Clock for YearClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.0, 6, 15, 12, 0, 0).unwrap()
    }
}

/// A configuration suited to tests: small chunks and a short timeout.
pub fn test_config() -> CoreConfig {
    CoreConfig {
        index_chunk_limit: 2,
        bulk_concurrency: 2,
        backend_timeout_ms: 200,
        retry: RetryConfig {
            max_retries: 3,
            initial_delay_ms: 10,
            max_delay_ms: 40,
            backoff_multiplier: 2.0,
        },
        ..CoreConfig::default()
    }
}

/// A service over an instrumented backend and counting store, issuing
/// numbers in 2024.
pub struct TestContext {
    pub backend: Arc<InstrumentedBackend>,
    pub store: Arc<CountingStore>,
    pub service: RegistrySearchService,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: CoreConfig) -> Self {
        let backend = InstrumentedBackend::new();
        let store = CountingStore::new();
        let service = RegistrySearchService::with_clock(
            config,
            store.clone(),
            backend.clone(),
            Arc::new(YearClock(2024)),
        )
        .expect("test config is valid");
        Self {
            backend,
            store,
            service,
        }
    }

    pub fn revoke(&self, token: &str) {
        self.store
            .revoke(&self.service.config().invalidation_namespace, token);
    }
}

pub const TOKEN: &str = "valid-token";
