//! Civil Registration Search Core
//!
//! This crate keeps a search index of civil registration records and serves
//! token-gated queries against it. It does not own the records themselves;
//! it reads finalized snapshots from the system of record and writes
//! normalized documents to a shared search backend.
//!
//! # Architecture
//!
//! - [`auth`] - Bearer token checks against a shared invalidation store
//! - [`identifier`] - Year-prefixed registration numbers
//! - [`chunk`] - Bounded batches for bulk writes
//! - [`indexer`] - Normalization, single and bulk indexing, the feed worker
//! - [`query`] - Criteria translation and authorized search
//! - [`backend`] - The search backend interface and its implementations
//! - [`service`] - The caller-facing API combining all of the above
//! - [`types`] - Records, index documents, and search types
//! - [`error`] - Error types and their retry classification
//! - [`config`] - Configuration passed to every component
//!
//! # Backend Features
//!
//! - `elasticsearch` - Elasticsearch backend over HTTP
//!
//! The in-memory backend is always available.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use civreg_search::auth::MemoryInvalidationStore;
//! use civreg_search::backend::MemorySearchBackend;
//! use civreg_search::config::CoreConfig;
//! use civreg_search::types::{Record, SearchCriteria};
//! use civreg_search::RegistrySearchService;
//! use serde_json::json;
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let store = Arc::new(MemoryInvalidationStore::new());
//! let backend = Arc::new(MemorySearchBackend::new());
//! let service = RegistrySearchService::new(CoreConfig::default(), store.clone(), backend).unwrap();
//!
//! let record = Record::from_json(json!({
//!     "resourceType": "Composition",
//!     "trackingId": "B7XK2Q1",
//!     "status": "REGISTERED",
//!     "title": "Birth Declaration",
//!     "date": "2024-03-09"
//! })).unwrap();
//!
//! let document = service.index_record("token-1", &record).await.unwrap();
//! assert!(document.key.ends_with("B7XK2Q1"));
//!
//! let results = service
//!     .search("token-1", &SearchCriteria::new().with_tracking_id("B7XK2Q1"))
//!     .await
//!     .unwrap();
//! assert_eq!(results.total, 1);
//!
//! store.invalidate_token("invalidToken", "token-1");
//! assert!(service.search("token-1", &SearchCriteria::new()).await.is_err());
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod auth;
pub mod backend;
pub mod chunk;
pub mod config;
mod deadline;
pub mod error;
pub mod identifier;
pub mod indexer;
pub mod query;
pub mod service;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{CoreError, CoreResult, ErrorKind};
pub use service::RegistrySearchService;
pub use types::{IndexDocument, Record, SearchCriteria, SearchResults};

// Re-export component entry points
pub use auth::{InvalidationStore, TokenValidator};
pub use backend::SearchBackend;
pub use chunk::create_chunks;
pub use config::{CoreConfig, RetryConfig};
pub use identifier::{RegistrationNumber, RegistrationNumberGenerator};
pub use indexer::{BulkSummary, RecordIndexer};
pub use query::QueryService;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
