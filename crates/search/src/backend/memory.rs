//! In-memory search backend.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::error::CoreResult;
use crate::identifier::RegistrationNumber;
use crate::types::IndexDocument;

use super::{BackendHits, BackendQuery, BulkItemOutcome, Filter, SearchBackend};

/// A search backend held entirely in process memory.
///
/// Writes are visible to the next query. Registration number assignment is
/// serialized by a mutex, which makes it atomic within this process only.
#[derive(Debug, Default)]
pub struct MemorySearchBackend {
    documents: RwLock<HashMap<String, IndexDocument>>,
    assignments: Mutex<HashMap<String, RegistrationNumber>>,
}

impl MemorySearchBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the document stored under `key`.
    pub fn get(&self, key: &str) -> Option<IndexDocument> {
        self.documents.read().get(key).cloned()
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns `true` if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Returns every stored document whose tracking id matches.
    pub fn documents_for(&self, tracking_id: &str) -> Vec<IndexDocument> {
        self.documents
            .read()
            .values()
            .filter(|doc| doc.tracking_id == tracking_id)
            .cloned()
            .collect()
    }

    /// Returns the assigned registration number for `tracking_id`.
    pub fn assignment(&self, tracking_id: &str) -> Option<RegistrationNumber> {
        self.assignments.lock().get(tracking_id).cloned()
    }
}

fn matches(document: &IndexDocument, filter: &Filter) -> bool {
    match filter {
        Filter::ResourceType(kind) => document.resource_type == *kind,
        Filter::TrackingId(id) => document.tracking_id == *id,
        Filter::RegistrationNumber(number) => document
            .registration_number
            .as_ref()
            .is_some_and(|n| n.as_str() == number),
        Filter::StatusIn(statuses) => statuses.contains(&document.status),
        Filter::EventDate { from, to } => document.event_date.is_some_and(|date| {
            from.is_none_or(|f| date >= f) && to.is_none_or(|t| date <= t)
        }),
        Filter::Text(text) => {
            let haystack = document.content_text.to_lowercase();
            text.split_whitespace()
                .all(|term| haystack.contains(&term.to_lowercase()))
        }
    }
}

/// Most recent event first, undated last, then by key for a stable order.
fn rank(a: &IndexDocument, b: &IndexDocument) -> Ordering {
    match (a.event_date, b.event_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.key.cmp(&b.key))
}

#[async_trait]
impl SearchBackend for MemorySearchBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, document: &IndexDocument) -> CoreResult<()> {
        self.documents
            .write()
            .insert(document.key.clone(), document.clone());
        Ok(())
    }

    async fn bulk_upsert(&self, documents: &[IndexDocument]) -> CoreResult<Vec<BulkItemOutcome>> {
        let mut stored = self.documents.write();
        Ok(documents
            .iter()
            .map(|doc| {
                stored.insert(doc.key.clone(), doc.clone());
                BulkItemOutcome::ok(&doc.key)
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> CoreResult<bool> {
        Ok(self.documents.write().remove(key).is_some())
    }

    async fn query(&self, query: &BackendQuery) -> CoreResult<BackendHits> {
        let mut hits: Vec<IndexDocument> = self
            .documents
            .read()
            .values()
            .filter(|doc| query.filters.iter().all(|f| matches(doc, f)))
            .cloned()
            .collect();
        hits.sort_by(rank);

        let total = hits.len() as u64;
        let documents = hits
            .into_iter()
            .skip(query.offset)
            .take(query.size)
            .collect();
        Ok(BackendHits { total, documents })
    }

    async fn assigned_number(&self, tracking_id: &str) -> CoreResult<Option<RegistrationNumber>> {
        Ok(self.assignment(tracking_id))
    }

    async fn assign_if_absent(
        &self,
        tracking_id: &str,
        candidate: RegistrationNumber,
    ) -> CoreResult<RegistrationNumber> {
        Ok(self
            .assignments
            .lock()
            .entry(tracking_id.to_string())
            .or_insert(candidate)
            .clone())
    }
}
