//! Record fixtures.

use serde_json::{Map, Value, json};

use civreg_search::identifier::RegistrationNumber;
use civreg_search::types::{Record, RegistrationStatus, ResourceKind};

/// A birth declaration fixture, built as a `Composition`.
#[derive(Debug, Clone)]
pub struct BirthFixture {
    /// Tracking id.
    pub tracking_id: String,
    /// Child given name.
    pub given: String,
    /// Child family name.
    pub family: String,
    /// Declaration date (YYYY-MM-DD).
    pub date: Option<String>,
    /// Workflow status.
    pub status: RegistrationStatus,
    /// Previously issued number.
    pub registration_number: Option<String>,
    /// Place of birth.
    pub place: Option<String>,
}

impl BirthFixture {
    /// Creates a declared birth with the given tracking id.
    pub fn new(tracking_id: impl Into<String>) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            given: "Kofi".to_string(),
            family: "Mensah".to_string(),
            date: Some("2024-03-09".to_string()),
            status: RegistrationStatus::Declared,
            registration_number: None,
            place: None,
        }
    }

    /// Sets the child's name.
    pub fn with_child(mut self, given: &str, family: &str) -> Self {
        self.given = given.to_string();
        self.family = family.to_string();
        self
    }

    /// Sets the declaration date.
    pub fn with_date(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: RegistrationStatus) -> Self {
        self.status = status;
        self
    }

    /// Marks the record as registered.
    pub fn registered(self) -> Self {
        self.with_status(RegistrationStatus::Registered)
    }

    /// Attaches a previously issued registration number.
    pub fn with_registration_number(mut self, number: &str) -> Self {
        self.registration_number = Some(number.to_string());
        self
    }

    /// Sets the place of birth.
    pub fn with_place(mut self, place: &str) -> Self {
        self.place = Some(place.to_string());
        self
    }

    /// Returns the untyped payload.
    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "resourceType": "Composition",
            "trackingId": self.tracking_id,
            "status": self.status.as_str(),
            "title": "Birth Declaration",
            "type": { "coding": [{ "system": "http://opencrvs.org/doc-types", "code": "birth-declaration" }] },
            "subject": { "display": format!("{} {}", self.given, self.family) },
            "section": [{
                "title": "Child details",
                "entry": [{ "given": [self.given], "family": self.family }]
            }],
            "text": { "status": "generated", "div": "<div>generated narrative</div>" }
        });
        if let Some(date) = &self.date {
            value["date"] = json!(date);
        }
        if let Some(number) = &self.registration_number {
            value["registrationNumber"] = json!(number);
        }
        if let Some(place) = &self.place {
            value["encounter"] = json!({ "display": place });
        }
        value
    }

    /// Builds the validated record.
    pub fn build(&self) -> Record {
        Record::from_json(self.to_json()).expect("fixture is a valid record")
    }
}

/// Builds `count` declared births with tracking ids `{prefix}0..{prefix}{count-1}`.
pub fn births(prefix: &str, count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| BirthFixture::new(format!("{}{}", prefix, i)).build())
        .collect()
}

/// Builds a record of any kind with the given fields.
pub fn record(kind: ResourceKind, tracking_id: &str, fields: Value) -> Record {
    let fields: Map<String, Value> = match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Record::new(kind, tracking_id, fields).expect("fixture is a valid record")
}

/// Builds a patient with a birth date.
pub fn patient(tracking_id: &str, given: &str, family: &str, birth_date: &str) -> Record {
    record(
        ResourceKind::Patient,
        tracking_id,
        json!({
            "name": [{ "given": [given], "family": family }],
            "birthDate": birth_date
        }),
    )
}

/// Wraps an issued number.
pub fn number(value: &str) -> RegistrationNumber {
    RegistrationNumber::from_issued(value)
}
