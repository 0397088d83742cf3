//! Index mappings for the records and registration number indices.

use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts};
use serde_json::{Value, json};

use crate::error::{CoreError, CoreResult, Dependency};

use super::backend::{ElasticsearchConfig, ElasticsearchSearchBackend};

/// Creates the mapping for record documents.
///
/// Flattened fields are kept in `_source` but not indexed; searches go
/// through the metadata keywords and `content_text`.
pub fn records_mapping(config: &ElasticsearchConfig) -> Value {
    json!({
        "settings": {
            "number_of_shards": config.number_of_shards,
            "number_of_replicas": config.number_of_replicas,
            "index.max_result_window": config.max_result_window,
            "refresh_interval": config.refresh_interval,
        },
        "mappings": {
            "properties": {
                "key": { "type": "keyword" },
                "resource_type": { "type": "keyword" },
                "tracking_id": { "type": "keyword" },
                "registration_number": { "type": "keyword" },
                "status": { "type": "keyword" },
                "event_date": { "type": "date" },
                "indexed_at": { "type": "date" },
                "fields": { "type": "object", "enabled": false },
                "content_text": {
                    "type": "text",
                    "analyzer": "standard"
                }
            }
        }
    })
}

/// Creates the mapping for issued registration numbers.
pub fn registration_numbers_mapping(config: &ElasticsearchConfig) -> Value {
    json!({
        "settings": {
            "number_of_shards": config.number_of_shards,
            "number_of_replicas": config.number_of_replicas,
        },
        "mappings": {
            "properties": {
                "tracking_id": { "type": "keyword" },
                "registration_number": { "type": "keyword" },
                "issued_at": { "type": "date" }
            }
        }
    })
}

/// Ensures `index` exists, creating it with `mapping` if necessary.
pub async fn ensure_index(
    backend: &ElasticsearchSearchBackend,
    index: &str,
    mapping: Value,
) -> CoreResult<()> {
    let exists_response = backend
        .client()
        .indices()
        .exists(IndicesExistsParts::Index(&[index]))
        .send()
        .await
        .map_err(|e| {
            CoreError::unavailable(
                Dependency::SearchBackend,
                format!("Failed to check index existence: {}", e),
            )
        })?;

    if exists_response.status_code().is_success() {
        return Ok(());
    }

    let response = backend
        .client()
        .indices()
        .create(IndicesCreateParts::Index(index))
        .body(mapping)
        .send()
        .await
        .map_err(|e| {
            CoreError::unavailable(
                Dependency::SearchBackend,
                format!("Failed to create index {}: {}", index, e),
            )
        })?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        // Another instance created it first.
        if body.contains("resource_already_exists_exception") {
            return Ok(());
        }
        return Err(CoreError::unavailable(
            Dependency::SearchBackend,
            format!("Failed to create index {} (status {}): {}", index, status, body),
        ));
    }

    tracing::debug!("Created Elasticsearch index '{}'", index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_mapping_structure() {
        let config = ElasticsearchConfig::default();
        let mapping = records_mapping(&config);

        assert_eq!(mapping["settings"]["number_of_shards"], 1);

        let props = &mapping["mappings"]["properties"];
        assert_eq!(props["key"]["type"], "keyword");
        assert_eq!(props["registration_number"]["type"], "keyword");
        assert_eq!(props["event_date"]["type"], "date");
        assert_eq!(props["content_text"]["type"], "text");
        assert_eq!(props["fields"]["enabled"], false);
    }

    #[test]
    fn test_registration_numbers_mapping() {
        let mapping = registration_numbers_mapping(&ElasticsearchConfig::default());
        let props = &mapping["mappings"]["properties"];
        assert_eq!(props["tracking_id"]["type"], "keyword");
        assert_eq!(props["registration_number"]["type"], "keyword");
    }
}
