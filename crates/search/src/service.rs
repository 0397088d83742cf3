//! The caller-facing, token-gated API.

use std::sync::Arc;

use tracing::info;

use crate::auth::{InvalidationStore, TokenValidator};
use crate::backend::SearchBackend;
use crate::config::CoreConfig;
use crate::error::{CoreResult, ValidationError};
use crate::identifier::{Clock, RegistrationNumberGenerator, SystemClock};
use crate::indexer::{BulkSummary, CancelSignal, RecordIndexer};
use crate::query::QueryService;
use crate::types::{IndexDocument, Record, SearchCriteria, SearchResults};

/// Index and search operations, each authorized by a bearer token.
///
/// Mutations and queries go through the same [`TokenValidator`]; a revoked
/// token is refused before any record is read or written.
#[derive(Debug)]
pub struct RegistrySearchService {
    config: CoreConfig,
    validator: TokenValidator,
    indexer: Arc<RecordIndexer>,
    query: QueryService,
}

impl RegistrySearchService {
    /// Creates a service using the system clock for registration numbers.
    ///
    /// # Errors
    ///
    /// * `ValidationError::InvalidConfig` - if `config` fails validation
    pub fn new(
        config: CoreConfig,
        store: Arc<dyn InvalidationStore>,
        backend: Arc<dyn SearchBackend>,
    ) -> CoreResult<Self> {
        Self::with_clock(config, store, backend, Arc::new(SystemClock))
    }

    /// Creates a service whose registration numbers take their year from `clock`.
    pub fn with_clock(
        config: CoreConfig,
        store: Arc<dyn InvalidationStore>,
        backend: Arc<dyn SearchBackend>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        config.validate().map_err(|errors| ValidationError::InvalidConfig {
            message: errors.join("; "),
        })?;

        let validator = TokenValidator::new(store, &config);
        let indexer = Arc::new(RecordIndexer::new(
            backend.clone(),
            RegistrationNumberGenerator::new(clock),
            &config,
        ));
        let query = QueryService::new(validator.clone(), backend.clone(), &config);

        info!(
            backend = backend.name(),
            chunk_limit = config.index_chunk_limit,
            concurrency = config.bulk_concurrency,
            "Registry search service ready"
        );

        Ok(Self {
            config,
            validator,
            indexer,
            query,
        })
    }

    /// Indexes one record.
    pub async fn index_record(&self, token: &str, record: &Record) -> CoreResult<IndexDocument> {
        self.validator.authorize(token).await?;
        self.indexer.index_record(record).await
    }

    /// Indexes many records in chunks. See [`RecordIndexer::bulk_index`].
    pub async fn bulk_index(
        &self,
        token: &str,
        records: Vec<Record>,
        cancel: CancelSignal,
    ) -> CoreResult<BulkSummary> {
        self.validator.authorize(token).await?;
        self.indexer.bulk_index(records, cancel).await
    }

    /// Searches the index.
    pub async fn search(&self, token: &str, criteria: &SearchCriteria) -> CoreResult<SearchResults> {
        self.query.search(token, criteria).await
    }

    /// Returns the indexer, for feeding an [`IndexWorker`](crate::indexer::IndexWorker).
    pub fn indexer(&self) -> &Arc<RecordIndexer> {
        &self.indexer
    }

    /// Returns the token validator.
    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}
