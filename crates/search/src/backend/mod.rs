//! Search backend interface and implementations.
//!
//! The core depends only on a few abstract operations: upsert by key, bulk
//! upsert, query by filter set, and a read plus an assign-if-absent write
//! for registration numbers. Each backend maps these onto its own wire protocol.
//!
//! Available backends:
//! - [`memory`] - In-process, always available
//! - `elasticsearch` - Elasticsearch over HTTP (feature `elasticsearch`)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::identifier::RegistrationNumber;
use crate::types::{IndexDocument, RegistrationStatus, ResourceKind};

#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;
pub mod memory;

pub use memory::MemorySearchBackend;

/// A single filter in a backend query.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact resource kind.
    ResourceType(ResourceKind),
    /// Exact tracking id.
    TrackingId(String),
    /// Exact registration number.
    RegistrationNumber(String),
    /// Status is one of these.
    StatusIn(Vec<RegistrationStatus>),
    /// Event date within inclusive bounds.
    EventDate {
        /// Lower bound.
        from: Option<DateTime<Utc>>,
        /// Upper bound.
        to: Option<DateTime<Utc>>,
    },
    /// All whitespace-separated terms appear in the document text.
    Text(String),
}

/// A translated query: filters joined by AND, plus a result window.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendQuery {
    /// Filters that must all match.
    pub filters: Vec<Filter>,
    /// Hits to skip.
    pub offset: usize,
    /// Hits to return.
    pub size: usize,
}

/// Raw query output from a backend.
#[derive(Debug, Clone, Default)]
pub struct BackendHits {
    /// Total matches, ignoring the window.
    pub total: u64,
    /// Documents within the window, in rank order.
    pub documents: Vec<IndexDocument>,
}

/// Outcome of one document in a bulk upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemOutcome {
    /// The document key.
    pub key: String,
    /// Rejection reason, or `None` on success.
    pub error: Option<String>,
}

impl BulkItemOutcome {
    /// A successful write.
    pub fn ok(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            error: None,
        }
    }

    /// A rejected write.
    pub fn rejected(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            error: Some(reason.into()),
        }
    }
}

/// A search index backend.
///
/// Backends are shared with other instances of this core and must tolerate
/// concurrent writers. Implementations report an unreachable backend as
/// `DependencyUnavailable` and a rejected document as `IndexWriteFailed`.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Returns a short name for logs.
    fn name(&self) -> &'static str;

    /// Writes `document` under its key, replacing any previous document.
    async fn upsert(&self, document: &IndexDocument) -> CoreResult<()>;

    /// Writes many documents in one call.
    ///
    /// Returns one outcome per input document. A transport-level failure
    /// fails the whole call instead.
    async fn bulk_upsert(&self, documents: &[IndexDocument]) -> CoreResult<Vec<BulkItemOutcome>>;

    /// Removes the document stored under `key`, returning whether it existed.
    async fn delete(&self, key: &str) -> CoreResult<bool>;

    /// Executes a query.
    async fn query(&self, query: &BackendQuery) -> CoreResult<BackendHits>;

    /// Returns the registration number stored for `tracking_id`, if any.
    async fn assigned_number(&self, tracking_id: &str) -> CoreResult<Option<RegistrationNumber>>;

    /// Stores `candidate` as the registration number for `tracking_id`
    /// unless one is already stored, and returns whichever is stored after
    /// the call.
    ///
    /// This must be a single conditional write in the backing store so that
    /// concurrent callers, including other processes, agree on one number.
    async fn assign_if_absent(
        &self,
        tracking_id: &str,
        candidate: RegistrationNumber,
    ) -> CoreResult<RegistrationNumber>;
}
