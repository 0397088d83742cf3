//! Elasticsearch search backend.
//!
//! # Index Structure
//!
//! Two indices share a configurable prefix:
//! - `{prefix}_records` holds one document per record, keyed by registration
//!   number or, before registration, by tracking id.
//! - `{prefix}_registration_numbers` holds one document per tracking id whose
//!   body is the issued number. It is written with `op_type=create`, so the
//!   first writer wins and later writers read back the stored value.
//!
//! # Example
//!
//! ```ignore
//! use civreg_search::backend::elasticsearch::{ElasticsearchConfig, ElasticsearchSearchBackend};
//!
//! let config = ElasticsearchConfig {
//!     nodes: vec!["http://localhost:9200".to_string()],
//!     ..Default::default()
//! };
//! let backend = ElasticsearchSearchBackend::new(config)?;
//! backend.initialize().await?;
//! ```

mod backend;
mod query_builder;
mod schema;

pub use backend::{ElasticsearchAuth, ElasticsearchConfig, ElasticsearchSearchBackend};
pub use query_builder::EsQueryBuilder;
