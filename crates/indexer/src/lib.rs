//! Operator CLI for the civil registration search index.
//!
//! `backfill` bulk-indexes records from an NDJSON file and prints a JSON
//! summary; `search` runs one query and prints the results.

pub mod backfill;
pub mod config;
pub mod search;

use std::sync::Arc;

use civreg_search::RegistrySearchService;
use civreg_search::auth::MemoryInvalidationStore;
use civreg_search::backend::{MemorySearchBackend, SearchBackend};

pub use config::{BackendKind, Command, IndexerConfig};

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("civreg_search={level},civreg_indexer={level}"))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Connects to the configured search backend.
pub async fn build_backend(config: &IndexerConfig) -> anyhow::Result<Arc<dyn SearchBackend>> {
    match config.backend {
        BackendKind::Memory => {
            tracing::info!("Using in-memory search backend; the index is discarded on exit");
            Ok(Arc::new(MemorySearchBackend::new()))
        }
        #[cfg(feature = "elasticsearch")]
        BackendKind::Elasticsearch => {
            use civreg_search::backend::elasticsearch::ElasticsearchSearchBackend;

            let backend = ElasticsearchSearchBackend::new(config.elasticsearch_config())?;
            backend.initialize().await?;
            tracing::info!(
                nodes = ?config.elasticsearch_nodes,
                index = %backend.records_index(),
                "Connected to Elasticsearch"
            );
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "elasticsearch"))]
        BackendKind::Elasticsearch => {
            anyhow::bail!(
                "The elasticsearch backend requires the 'elasticsearch' feature. \
                 Build with: cargo build -p civreg-indexer --features elasticsearch"
            )
        }
    }
}

/// Builds the service over `backend`, seeding the invalidation store with
/// the configured revoked tokens.
pub fn build_service(
    config: &IndexerConfig,
    backend: Arc<dyn SearchBackend>,
) -> anyhow::Result<RegistrySearchService> {
    let core = config.core_config()?;

    let store = Arc::new(MemoryInvalidationStore::new());
    for token in config.revoked_tokens.iter().filter(|t| !t.is_empty()) {
        store.invalidate_token(&core.invalidation_namespace, token);
    }

    Ok(RegistrySearchService::new(core, store, backend)?)
}
