//! Elasticsearch Query DSL builder.
//!
//! Translates a [`BackendQuery`] into a search request body.

use serde_json::{Value, json};

use crate::backend::{BackendQuery, Filter};

/// Builds Elasticsearch query bodies.
#[derive(Debug, Default, Clone, Copy)]
pub struct EsQueryBuilder;

impl EsQueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        Self
    }

    /// Builds a complete search body.
    ///
    /// Exact filters go into the `filter` context. Free text is the only
    /// `must` clause and requires every term.
    pub fn build(&self, query: &BackendQuery) -> Value {
        let mut filter_clauses: Vec<Value> = Vec::new();
        let mut must_clauses: Vec<Value> = Vec::new();

        for filter in &query.filters {
            match filter {
                Filter::Text(text) => must_clauses.push(json!({
                    "match": {
                        "content_text": { "query": text, "operator": "and" }
                    }
                })),
                other => filter_clauses.push(self.build_filter_clause(other)),
            }
        }

        let mut bool_query = json!({ "filter": filter_clauses });
        if !must_clauses.is_empty() {
            bool_query["must"] = json!(must_clauses);
        }

        json!({
            "query": { "bool": bool_query },
            "sort": [
                { "event_date": { "order": "desc", "missing": "_last" } },
                { "key": { "order": "asc" } }
            ],
            "from": query.offset,
            "size": query.size,
            "track_total_hits": true,
        })
    }

    fn build_filter_clause(&self, filter: &Filter) -> Value {
        match filter {
            Filter::ResourceType(kind) => json!({ "term": { "resource_type": kind.as_str() } }),
            Filter::TrackingId(id) => json!({ "term": { "tracking_id": id } }),
            Filter::RegistrationNumber(number) => {
                json!({ "term": { "registration_number": number } })
            }
            Filter::StatusIn(statuses) => {
                let values: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
                json!({ "terms": { "status": values } })
            }
            Filter::EventDate { from, to } => {
                let mut range = serde_json::Map::new();
                if let Some(from) = from {
                    range.insert("gte".to_string(), json!(from.to_rfc3339()));
                }
                if let Some(to) = to {
                    range.insert("lte".to_string(), json!(to.to_rfc3339()));
                }
                json!({ "range": { "event_date": range } })
            }
            Filter::Text(text) => json!({ "match": { "content_text": text } }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RegistrationStatus, ResourceKind};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_filters_and_text_split() {
        let query = BackendQuery {
            filters: vec![
                Filter::ResourceType(ResourceKind::Composition),
                Filter::StatusIn(vec![RegistrationStatus::Registered]),
                Filter::Text("Kofi Mensah".to_string()),
            ],
            offset: 10,
            size: 5,
        };
        let body = EsQueryBuilder::new().build(&query);

        let filters = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0]["term"]["resource_type"], "Composition");
        assert_eq!(filters[1]["terms"]["status"][0], "REGISTERED");

        let must = &body["query"]["bool"]["must"][0]["match"]["content_text"];
        assert_eq!(must["operator"], "and");
        assert_eq!(body["from"], 10);
        assert_eq!(body["size"], 5);
        assert_eq!(body["track_total_hits"], true);
    }

    #[test]
    fn test_open_date_range_omits_bound() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let query = BackendQuery {
            filters: vec![Filter::EventDate {
                from: Some(from),
                to: None,
            }],
            offset: 0,
            size: 20,
        };
        let body = EsQueryBuilder::new().build(&query);
        let range = &body["query"]["bool"]["filter"][0]["range"]["event_date"];
        assert!(range.get("gte").is_some());
        assert!(range.get("lte").is_none());
        assert!(body["query"]["bool"].get("must").is_none());
    }
}
