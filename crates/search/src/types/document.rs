//! Normalized index documents.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifier::RegistrationNumber;

use super::record::{RegistrationStatus, ResourceKind};

/// The searchable, flattened form of a [`Record`](super::Record).
///
/// Keyed by registration number once one is issued, by tracking id before
/// that. A re-index replaces the whole document; fields are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Document key in the backend.
    pub key: String,
    /// Resource kind of the source record.
    pub resource_type: ResourceKind,
    /// Tracking id of the source record.
    pub tracking_id: String,
    /// Issued registration number, if any.
    pub registration_number: Option<RegistrationNumber>,
    /// Workflow status at indexing time.
    pub status: RegistrationStatus,
    /// Kind-specific event date.
    pub event_date: Option<DateTime<Utc>>,
    /// Scalar leaves of the record, keyed by dotted path.
    pub fields: BTreeMap<String, Value>,
    /// All string leaves joined by spaces, for free-text matching.
    pub content_text: String,
    /// When this document was produced.
    pub indexed_at: DateTime<Utc>,
}

impl IndexDocument {
    /// Returns the key a document for `tracking_id` has before registration.
    pub fn provisional_key(tracking_id: &str) -> &str {
        tracking_id
    }

    /// Returns `true` if a provisional document for the same record must be removed.
    pub fn supersedes_provisional(&self) -> bool {
        self.key != Self::provisional_key(&self.tracking_id)
    }
}
