//! Translation of [`SearchCriteria`] into backend queries.

use crate::backend::{BackendQuery, Filter};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::SearchCriteria;

/// Turns structured criteria into a [`BackendQuery`].
///
/// Combinations the backend cannot answer faithfully are rejected with
/// `UnsupportedQuery` instead of being dropped:
/// - an exact identifier lookup combined with free text
/// - a date range without a resource type, or for a kind with no event date
/// - a page larger than `max_page_size`
/// - a window (`offset + count`) reaching past `max_result_window`
#[derive(Debug, Clone)]
pub struct QueryTranslator {
    default_page_size: usize,
    max_page_size: usize,
    max_result_window: usize,
}

fn invalid(criterion: &str, message: &str) -> CoreError {
    ValidationError::InvalidCriterion {
        criterion: criterion.to_string(),
        message: message.to_string(),
    }
    .into()
}

impl QueryTranslator {
    /// Creates a translator with the page limits from `config`.
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            max_result_window: config.max_result_window,
        }
    }

    /// Translates `criteria`.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - empty identifiers or text, zero count, reversed date range
    /// * `UnsupportedQuery` - see the type-level documentation
    pub fn translate(&self, criteria: &SearchCriteria) -> CoreResult<BackendQuery> {
        let mut filters = Vec::new();

        if let Some(kind) = criteria.resource_type {
            filters.push(Filter::ResourceType(kind));
        }

        let mut identifier_lookup = false;
        if let Some(tracking_id) = &criteria.tracking_id {
            if tracking_id.is_empty() {
                return Err(invalid("tracking_id", "must not be empty"));
            }
            filters.push(Filter::TrackingId(tracking_id.clone()));
            identifier_lookup = true;
        }
        if let Some(number) = &criteria.registration_number {
            if number.is_empty() {
                return Err(invalid("registration_number", "must not be empty"));
            }
            filters.push(Filter::RegistrationNumber(number.clone()));
            identifier_lookup = true;
        }

        if !criteria.statuses.is_empty() {
            let mut statuses = criteria.statuses.clone();
            statuses.sort_by_key(|s| s.as_str());
            statuses.dedup();
            filters.push(Filter::StatusIn(statuses));
        }

        if let Some(range) = criteria.date_range {
            if let (Some(from), Some(to)) = (range.from, range.to)
                && from > to
            {
                return Err(ValidationError::InvalidDateRange {
                    from: from.to_rfc3339(),
                    to: to.to_rfc3339(),
                }
                .into());
            }
            let kind = criteria.resource_type.ok_or_else(|| {
                CoreError::unsupported_query("date range requires a resource type")
            })?;
            if kind.date_field().is_none() {
                return Err(CoreError::unsupported_query(format!(
                    "{} has no event date to filter on",
                    kind
                )));
            }
            if range.from.is_some() || range.to.is_some() {
                filters.push(Filter::EventDate {
                    from: range.from,
                    to: range.to,
                });
            }
        }

        if let Some(text) = &criteria.text {
            if text.trim().is_empty() {
                return Err(invalid("text", "must not be empty"));
            }
            if identifier_lookup {
                return Err(CoreError::unsupported_query(
                    "free text cannot be combined with an identifier lookup",
                ));
            }
            filters.push(Filter::Text(text.trim().to_string()));
        }

        let size = match criteria.count {
            Some(0) => return Err(invalid("count", "must be positive")),
            Some(count) if count > self.max_page_size => {
                return Err(CoreError::unsupported_query(format!(
                    "count {} exceeds the maximum page size of {}",
                    count, self.max_page_size
                )));
            }
            Some(count) => count,
            None => self.default_page_size,
        };

        let offset = criteria.offset.unwrap_or(0);
        if offset.saturating_add(size) > self.max_result_window {
            return Err(CoreError::unsupported_query(format!(
                "offset {} with count {} reaches past the result window of {}",
                offset, size, self.max_result_window
            )));
        }

        Ok(BackendQuery {
            filters,
            offset,
            size,
        })
    }
}
