//! Structured search requests and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::IndexDocument;
use super::record::{RegistrationStatus, ResourceKind};

/// An inclusive event-date window. Either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    /// Lower bound, inclusive.
    pub from: Option<DateTime<Utc>>,
    /// Upper bound, inclusive.
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Creates a closed range.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Returns `true` if `instant` lies within the range.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| instant >= from) && self.to.is_none_or(|to| instant <= to)
    }
}

/// Filters for a search request.
///
/// All set filters must match. An empty criteria value matches every
/// document.
///
/// # Example
///
/// ```
/// use civreg_search::types::{RegistrationStatus, ResourceKind, SearchCriteria};
///
/// let criteria = SearchCriteria::for_type(ResourceKind::Composition)
///     .with_status(RegistrationStatus::Registered)
///     .with_text("Kofi Mensah")
///     .with_count(10);
/// assert_eq!(criteria.count, Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Restrict to one resource kind.
    #[serde(default)]
    pub resource_type: Option<ResourceKind>,
    /// Exact tracking id.
    #[serde(default)]
    pub tracking_id: Option<String>,
    /// Exact registration number.
    #[serde(default)]
    pub registration_number: Option<String>,
    /// Any of these statuses.
    #[serde(default)]
    pub statuses: Vec<RegistrationStatus>,
    /// Event-date window. Requires `resource_type`.
    #[serde(default)]
    pub date_range: Option<DateRange>,
    /// Free-text terms, all of which must appear.
    #[serde(default)]
    pub text: Option<String>,
    /// Results to skip.
    #[serde(default)]
    pub offset: Option<usize>,
    /// Results to return.
    #[serde(default)]
    pub count: Option<usize>,
}

impl SearchCriteria {
    /// Creates criteria matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates criteria restricted to one resource kind.
    pub fn for_type(kind: ResourceKind) -> Self {
        Self {
            resource_type: Some(kind),
            ..Self::default()
        }
    }

    /// Matches one tracking id.
    pub fn with_tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }

    /// Matches one registration number.
    pub fn with_registration_number(mut self, number: impl Into<String>) -> Self {
        self.registration_number = Some(number.into());
        self
    }

    /// Adds an accepted status.
    pub fn with_status(mut self, status: RegistrationStatus) -> Self {
        self.statuses.push(status);
        self
    }

    /// Restricts the event date.
    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Adds free-text terms.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the number of results to skip.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the page size.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

/// Backend-independent search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Matching documents in rank order.
    pub items: Vec<IndexDocument>,
    /// Total matches across all pages.
    pub total: u64,
}

impl SearchResults {
    /// Returns `true` if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
