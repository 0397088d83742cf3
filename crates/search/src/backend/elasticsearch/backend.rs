//! Elasticsearch client, configuration, and [`SearchBackend`] implementation.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::request::JsonBody;
use elasticsearch::http::response::Response;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::{
    BulkParts, CreateParts, DeleteParts, Elasticsearch, GetParts, IndexParts, SearchParts,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::backend::{BackendHits, BackendQuery, BulkItemOutcome, SearchBackend};
use crate::error::{CoreError, CoreResult, Dependency};
use crate::identifier::RegistrationNumber;
use crate::types::IndexDocument;

use super::query_builder::EsQueryBuilder;
use super::schema;

/// Authentication configuration for Elasticsearch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElasticsearchAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

/// Configuration for the Elasticsearch backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Elasticsearch node URLs. Only the first node is used.
    pub nodes: Vec<String>,

    /// Index name prefix (default: `"civreg"`).
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Number of primary shards per index (default: 1).
    #[serde(default = "default_shards")]
    pub number_of_shards: u32,

    /// Number of replica shards per index (default: 1).
    #[serde(default = "default_replicas")]
    pub number_of_replicas: u32,

    /// Refresh interval (default: "1s").
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,

    /// Maximum result window size (default: 10000).
    #[serde(default = "default_max_result_window")]
    pub max_result_window: u32,

    /// Transport timeout in milliseconds (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ElasticsearchAuth>,

    /// Whether to disable certificate validation (default: false).
    #[serde(default)]
    pub disable_certificate_validation: bool,
}

fn default_index_prefix() -> String {
    "civreg".to_string()
}

fn default_shards() -> u32 {
    1
}

fn default_replicas() -> u32 {
    1
}

fn default_refresh_interval() -> String {
    "1s".to_string()
}

fn default_max_result_window() -> u32 {
    10000
}

fn default_request_timeout_ms() -> u64 {
    30000
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["http://localhost:9200".to_string()],
            index_prefix: default_index_prefix(),
            number_of_shards: default_shards(),
            number_of_replicas: default_replicas(),
            refresh_interval: default_refresh_interval(),
            max_result_window: default_max_result_window(),
            request_timeout_ms: default_request_timeout_ms(),
            auth: None,
            disable_certificate_validation: false,
        }
    }
}

/// Search backend over an Elasticsearch cluster.
pub struct ElasticsearchSearchBackend {
    client: Elasticsearch,
    config: ElasticsearchConfig,
    query_builder: EsQueryBuilder,
}

impl Debug for ElasticsearchSearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchSearchBackend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn unavailable(message: String) -> CoreError {
    CoreError::unavailable(Dependency::SearchBackend, message)
}

impl ElasticsearchSearchBackend {
    /// Creates a new backend. No request is sent until [`initialize`](Self::initialize).
    pub fn new(config: ElasticsearchConfig) -> CoreResult<Self> {
        let client = Self::build_client(&config)?;
        Ok(Self {
            client,
            config,
            query_builder: EsQueryBuilder::new(),
        })
    }

    fn build_client(config: &ElasticsearchConfig) -> CoreResult<Elasticsearch> {
        let url = config
            .nodes
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:9200".to_string());

        let parsed_url: elasticsearch::http::Url = url
            .parse()
            .map_err(|e| unavailable(format!("Invalid URL: {}", e)))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);

        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(Duration::from_millis(config.request_timeout_ms));

        if config.disable_certificate_validation {
            builder = builder.cert_validation(CertificateValidation::None);
        }

        if let Some(ref auth) = config.auth {
            builder = match auth {
                ElasticsearchAuth::Basic { username, password } => {
                    builder.auth(Credentials::Basic(username.clone(), password.clone()))
                }
                ElasticsearchAuth::Bearer { token } => {
                    builder.auth(Credentials::Bearer(token.clone()))
                }
            };
        }

        let transport = builder
            .build()
            .map_err(|e| unavailable(format!("Failed to build transport: {}", e)))?;

        Ok(Elasticsearch::new(transport))
    }

    /// Creates both indices if they do not exist.
    pub async fn initialize(&self) -> CoreResult<()> {
        schema::ensure_index(self, &self.records_index(), schema::records_mapping(&self.config))
            .await?;
        schema::ensure_index(
            self,
            &self.registration_numbers_index(),
            schema::registration_numbers_mapping(&self.config),
        )
        .await?;
        tracing::info!(prefix = %self.config.index_prefix, "Elasticsearch indices ready");
        Ok(())
    }

    pub(crate) fn client(&self) -> &Elasticsearch {
        &self.client
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    /// Returns the name of the records index.
    pub fn records_index(&self) -> String {
        format!("{}_records", self.config.index_prefix)
    }

    /// Returns the name of the registration numbers index.
    pub fn registration_numbers_index(&self) -> String {
        format!("{}_registration_numbers", self.config.index_prefix)
    }

    /// Refreshes the records index so recent writes are searchable.
    ///
    /// Only needed in tests; the cluster refreshes on its own interval.
    pub async fn refresh(&self) -> CoreResult<()> {
        let index = self.records_index();
        self.client
            .indices()
            .refresh(elasticsearch::indices::IndicesRefreshParts::Index(&[&index]))
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to refresh index {}: {}", index, e)))?;
        Ok(())
    }

    /// Maps a non-success response for a single document.
    ///
    /// Server errors mean the cluster is unhealthy; anything else is a
    /// rejection of this document.
    async fn reject(response: Response, tracking_id: &str, action: &str) -> CoreError {
        let status = response.status_code();
        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            unavailable(format!("{} failed (status {}): {}", action, status, body))
        } else {
            CoreError::write_failed(tracking_id, format!("status {}: {}", status, body))
        }
    }

    /// Reads the stored registration number; `None` if none was issued.
    async fn stored_number(&self, tracking_id: &str) -> CoreResult<Option<RegistrationNumber>> {
        let index = self.registration_numbers_index();
        let response = self
            .client
            .get(GetParts::IndexId(&index, tracking_id))
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to read registration number: {}", e)))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::reject(response, tracking_id, "Registration number lookup").await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| unavailable(format!("Failed to parse ES response: {}", e)))?;

        parse_stored_number(&body, tracking_id).map(Some)
    }
}

/// Reads the number from a registration-number document returned by GET.
fn parse_stored_number(body: &Value, tracking_id: &str) -> CoreResult<RegistrationNumber> {
    body.get("_source")
        .and_then(|s| s.get("registration_number"))
        .and_then(|n| n.as_str())
        .map(RegistrationNumber::from_issued)
        .ok_or_else(|| {
            unavailable(format!(
                "Registration number document for {} has no value",
                tracking_id
            ))
        })
}

/// Maps a failed `_search` response to an error.
///
/// Overload and server errors are transient. Any other 4xx means the
/// request itself cannot be answered and retrying will not help.
fn search_failure(status: u16, body: &str) -> CoreError {
    if status == 429 || status >= 500 {
        unavailable(format!("Search failed (status {}): {}", status, body))
    } else {
        CoreError::unsupported_query(format!("search rejected (status {}): {}", status, body))
    }
}

/// Reads per-item outcomes from a `_bulk` response body.
fn parse_bulk_items(body: &Value, documents: &[IndexDocument]) -> Vec<BulkItemOutcome> {
    let items = body
        .get("items")
        .and_then(|i| i.as_array())
        .cloned()
        .unwrap_or_default();

    documents
        .iter()
        .enumerate()
        .map(|(position, doc)| {
            let result = items.get(position).and_then(|item| item.get("index"));
            match result {
                Some(result) => match result.get("error") {
                    Some(error) => {
                        let reason = error
                            .get("reason")
                            .and_then(|r| r.as_str())
                            .map(str::to_string)
                            .unwrap_or_else(|| error.to_string());
                        BulkItemOutcome::rejected(&doc.key, reason)
                    }
                    None => BulkItemOutcome::ok(&doc.key),
                },
                None => BulkItemOutcome::rejected(&doc.key, "missing item in bulk response"),
            }
        })
        .collect()
}

#[async_trait]
impl SearchBackend for ElasticsearchSearchBackend {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn upsert(&self, document: &IndexDocument) -> CoreResult<()> {
        let index = self.records_index();
        let body = serde_json::to_value(document)?;

        let response = self
            .client
            .index(IndexParts::IndexId(&index, &document.key))
            .body(body)
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to index document: {}", e)))?;

        if !response.status_code().is_success() {
            return Err(Self::reject(response, &document.tracking_id, "Index").await);
        }
        Ok(())
    }

    async fn bulk_upsert(&self, documents: &[IndexDocument]) -> CoreResult<Vec<BulkItemOutcome>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.records_index();
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for doc in documents {
            body.push(json!({ "index": { "_id": doc.key } }).into());
            body.push(serde_json::to_value(doc)?.into());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(&index))
            .body(body)
            .send()
            .await
            .map_err(|e| unavailable(format!("Bulk request failed: {}", e)))?;

        let status = response.status_code();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(unavailable(format!(
                "Bulk request failed (status {}): {}",
                status, text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| unavailable(format!("Failed to parse bulk response: {}", e)))?;

        Ok(parse_bulk_items(&body, documents))
    }

    async fn delete(&self, key: &str) -> CoreResult<bool> {
        let index = self.records_index();
        let response = self
            .client
            .delete(DeleteParts::IndexId(&index, key))
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to delete document: {}", e)))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::reject(response, key, "Delete").await);
        }
        Ok(true)
    }

    async fn query(&self, query: &BackendQuery) -> CoreResult<BackendHits> {
        let index = self.records_index();
        let body = self.query_builder.build(query);

        let response = self
            .client
            .search(SearchParts::Index(&[&index]))
            .body(body)
            .send()
            .await
            .map_err(|e| unavailable(format!("Search failed: {}", e)))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Nothing has been indexed yet.
            if body.contains("index_not_found_exception") {
                return Ok(BackendHits::default());
            }
            return Err(search_failure(status.as_u16(), &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| unavailable(format!("Failed to parse search response: {}", e)))?;

        let hits = body
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(|h| h.as_array())
            .cloned()
            .unwrap_or_default();

        let total = body
            .get("hits")
            .and_then(|h| h.get("total"))
            .and_then(|t| t.get("value"))
            .and_then(|v| v.as_u64())
            .unwrap_or(hits.len() as u64);

        let mut documents = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(source) = hit.get("_source") else {
                continue;
            };
            match serde_json::from_value::<IndexDocument>(source.clone()) {
                Ok(doc) => documents.push(doc),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable search hit"),
            }
        }

        Ok(BackendHits { total, documents })
    }

    async fn assigned_number(&self, tracking_id: &str) -> CoreResult<Option<RegistrationNumber>> {
        self.stored_number(tracking_id).await
    }

    async fn assign_if_absent(
        &self,
        tracking_id: &str,
        candidate: RegistrationNumber,
    ) -> CoreResult<RegistrationNumber> {
        let index = self.registration_numbers_index();
        let response = self
            .client
            .create(CreateParts::IndexId(&index, tracking_id))
            .body(json!({
                "tracking_id": tracking_id,
                "registration_number": candidate.as_str(),
                "issued_at": Utc::now().to_rfc3339(),
            }))
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to store registration number: {}", e)))?;

        let status = response.status_code();
        if status.is_success() {
            return Ok(candidate);
        }
        if status.as_u16() == 409 {
            tracing::debug!(tracking_id, "Registration number already issued");
            return self.stored_number(tracking_id).await?.ok_or_else(|| {
                unavailable(format!(
                    "Registration number for {} conflicted but could not be read",
                    tracking_id
                ))
            });
        }
        Err(Self::reject(response, tracking_id, "Registration number write").await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RegistrationStatus, ResourceKind};
    use std::collections::BTreeMap;

    fn doc(key: &str) -> IndexDocument {
        IndexDocument {
            key: key.to_string(),
            resource_type: ResourceKind::Patient,
            tracking_id: key.to_string(),
            registration_number: None,
            status: RegistrationStatus::Declared,
            event_date: None,
            fields: BTreeMap::new(),
            content_text: String::new(),
            indexed_at: Utc::now(),
        }
    }

    #[test]
    fn test_index_names() {
        let backend = ElasticsearchSearchBackend::new(ElasticsearchConfig {
            index_prefix: "test".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(backend.records_index(), "test_records");
        assert_eq!(backend.registration_numbers_index(), "test_registration_numbers");
    }

    #[test]
    fn test_parse_stored_number() {
        let body = json!({
            "_id": "B1",
            "found": true,
            "_source": { "tracking_id": "B1", "registration_number": "2024B1" }
        });
        assert_eq!(parse_stored_number(&body, "B1").unwrap().as_str(), "2024B1");

        let empty = json!({ "_id": "B1", "found": true, "_source": {} });
        assert!(parse_stored_number(&empty, "B1").is_err());
    }

    #[test]
    fn test_search_failure_classification() {
        use crate::error::ErrorKind;

        let window = search_failure(
            400,
            r#"{"error":{"type":"illegal_argument_exception","reason":"Result window is too large"}}"#,
        );
        assert_eq!(window.kind(), ErrorKind::UnsupportedQuery);
        assert!(!window.kind().is_retryable());

        assert_eq!(
            search_failure(429, "").kind(),
            ErrorKind::DependencyUnavailable
        );
        assert_eq!(
            search_failure(503, "").kind(),
            ErrorKind::DependencyUnavailable
        );
    }

    #[test]
    fn test_invalid_url_is_unavailable() {
        let err = ElasticsearchSearchBackend::new(ElasticsearchConfig {
            nodes: vec!["not a url".to_string()],
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DependencyUnavailable);
    }

    #[test]
    fn test_parse_bulk_items() {
        let docs = vec![doc("a"), doc("b")];
        let body = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "a", "status": 200 } },
                { "index": { "_id": "b", "status": 400,
                    "error": { "type": "mapper_parsing_exception", "reason": "bad date" } } }
            ]
        });
        let outcomes = parse_bulk_items(&body, &docs);
        assert_eq!(outcomes[0], BulkItemOutcome::ok("a"));
        assert_eq!(outcomes[1], BulkItemOutcome::rejected("b", "bad date"));
    }

    #[test]
    fn test_parse_bulk_items_short_response() {
        let docs = vec![doc("a"), doc("b")];
        let body = json!({ "items": [ { "index": { "_id": "a", "status": 201 } } ] });
        let outcomes = parse_bulk_items(&body, &docs);
        assert!(outcomes[0].error.is_none());
        assert!(outcomes[1].error.is_some());
    }
}
