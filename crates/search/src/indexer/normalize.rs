//! Record to index document normalization.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::identifier::RegistrationNumber;
use crate::types::{IndexDocument, Record};

/// Keys whose string content is never searchable text: generated XHTML
/// narrative and base64 attachment payloads.
const NON_TEXT_KEYS: [&str; 2] = ["div", "data"];

/// Builds the searchable form of `record`.
///
/// The document is keyed by `registration_number` when present, by the
/// tracking id otherwise.
pub fn normalize(
    record: &Record,
    registration_number: Option<RegistrationNumber>,
    indexed_at: DateTime<Utc>,
) -> IndexDocument {
    let key = match &registration_number {
        Some(number) => number.as_str().to_string(),
        None => IndexDocument::provisional_key(record.tracking_id()).to_string(),
    };

    let mut fields = BTreeMap::new();
    let mut text = Vec::new();
    for (name, value) in record.fields() {
        flatten(name, value, &mut fields);
        collect_text(name, value, &mut text);
    }

    IndexDocument {
        key,
        resource_type: record.kind(),
        tracking_id: record.tracking_id().to_string(),
        registration_number,
        status: record.status(),
        event_date: record.event_date(),
        fields,
        content_text: text.join(" "),
        indexed_at,
    }
}

/// Writes every scalar leaf under its dotted path. Array elements use their
/// position as the path segment. Nulls are dropped.
fn flatten(path: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&format!("{}.{}", path, key), child, out);
            }
        }
        Value::Array(items) => {
            for (position, child) in items.iter().enumerate() {
                flatten(&format!("{}.{}", path, position), child, out);
            }
        }
        Value::Null => {}
        scalar => {
            out.insert(path.to_string(), scalar.clone());
        }
    }
}

fn collect_text<'a>(key: &str, value: &'a Value, out: &mut Vec<&'a str>) {
    if NON_TEXT_KEYS.contains(&key) {
        return;
    }
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s.trim()),
        Value::Object(map) => {
            for (child_key, child) in map {
                collect_text(child_key, child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_text(key, child, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RegistrationStatus, ResourceKind};
    use serde_json::json;

    fn patient() -> Record {
        Record::from_json(json!({
            "resourceType": "Patient",
            "trackingId": "B7XK2Q1",
            "status": "DECLARED",
            "name": [{ "given": ["Kofi"], "family": "Mensah" }],
            "birthDate": "2024-03-09",
            "multipleBirthInteger": 1,
            "deceasedBoolean": null,
            "text": { "status": "generated", "div": "<div>Kofi</div>" },
            "photo": [{ "data": "aGVsbG8=" }]
        }))
        .unwrap()
    }

    #[test]
    fn test_flattens_to_dotted_paths() {
        let doc = normalize(&patient(), None, Utc::now());
        assert_eq!(doc.fields["name.0.family"], json!("Mensah"));
        assert_eq!(doc.fields["name.0.given.0"], json!("Kofi"));
        assert_eq!(doc.fields["multipleBirthInteger"], json!(1));
        assert!(!doc.fields.contains_key("deceasedBoolean"));
    }

    #[test]
    fn test_content_text_skips_narrative_and_attachments() {
        let doc = normalize(&patient(), None, Utc::now());
        assert!(doc.content_text.contains("Kofi"));
        assert!(doc.content_text.contains("Mensah"));
        assert!(!doc.content_text.contains("<div>"));
        assert!(!doc.content_text.contains("aGVsbG8="));
    }

    #[test]
    fn test_key_prefers_registration_number() {
        let record = patient().with_status(RegistrationStatus::Registered);
        let provisional = normalize(&record, None, Utc::now());
        assert_eq!(provisional.key, "B7XK2Q1");
        assert!(!provisional.supersedes_provisional());

        let number = RegistrationNumber::from_issued("2024B7XK2Q1");
        let registered = normalize(&record, Some(number.clone()), Utc::now());
        assert_eq!(registered.key, "2024B7XK2Q1");
        assert_eq!(registered.registration_number, Some(number));
        assert!(registered.supersedes_provisional());
    }

    #[test]
    fn test_event_date_and_metadata() {
        let doc = normalize(&patient(), None, Utc::now());
        assert_eq!(doc.resource_type, ResourceKind::Patient);
        assert_eq!(doc.status, RegistrationStatus::Declared);
        assert_eq!(
            doc.event_date.map(|d| d.format("%Y-%m-%d").to_string()),
            Some("2024-03-09".to_string())
        );
    }
}
