//! Records read from the system of record.
//!
//! Untyped payloads are validated once, at the boundary, by
//! [`Record::from_json`]. Everything past that point works with the closed
//! [`ResourceKind`] and [`RegistrationStatus`] enums.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::identifier::RegistrationNumber;

/// The kinds of resource documents the core indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A declaration or registration document (birth, death, marriage).
    Composition,
    /// The subject of an event: child, deceased, spouse.
    Patient,
    /// Mother, father, informant, or witness.
    RelatedPerson,
    /// Workflow state of a declaration.
    Task,
    /// Clinical observations such as birth weight or cause of death.
    Observation,
    /// The birth or death event encounter.
    Encounter,
    /// An administrative area or facility.
    Location,
    /// A registrar or field agent.
    Practitioner,
    /// Supporting documents.
    DocumentReference,
}

impl ResourceKind {
    /// All supported kinds.
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Composition,
        ResourceKind::Patient,
        ResourceKind::RelatedPerson,
        ResourceKind::Task,
        ResourceKind::Observation,
        ResourceKind::Encounter,
        ResourceKind::Location,
        ResourceKind::Practitioner,
        ResourceKind::DocumentReference,
    ];

    /// Returns the `resourceType` string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Composition => "Composition",
            ResourceKind::Patient => "Patient",
            ResourceKind::RelatedPerson => "RelatedPerson",
            ResourceKind::Task => "Task",
            ResourceKind::Observation => "Observation",
            ResourceKind::Encounter => "Encounter",
            ResourceKind::Location => "Location",
            ResourceKind::Practitioner => "Practitioner",
            ResourceKind::DocumentReference => "DocumentReference",
        }
    }

    /// Dotted path of the field holding this kind's event date, if it has one.
    pub fn date_field(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Composition => Some("date"),
            ResourceKind::Patient => Some("birthDate"),
            ResourceKind::Task => Some("lastModified"),
            ResourceKind::Observation => Some("effectiveDateTime"),
            ResourceKind::Encounter => Some("period.start"),
            ResourceKind::DocumentReference => Some("date"),
            ResourceKind::RelatedPerson | ResourceKind::Location | ResourceKind::Practitioner => {
                None
            }
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                ValidationError::UnknownResourceType {
                    resource_type: s.to_string(),
                }
                .into()
            })
    }
}

/// Registration workflow status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    /// Draft, not yet submitted.
    #[default]
    InProgress,
    /// Submitted by a field agent.
    Declared,
    /// Checked by a registration agent.
    Validated,
    /// Approved by a registrar.
    Registered,
    /// A certificate has been printed.
    Certified,
    /// The certificate has been handed over.
    Issued,
    /// Sent back for correction.
    Rejected,
    /// Withdrawn from the workflow.
    Archived,
}

impl RegistrationStatus {
    /// Returns `true` for statuses that carry a registration number.
    pub fn issues_registration_number(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Registered
                | RegistrationStatus::Certified
                | RegistrationStatus::Issued
        )
    }

    /// Returns the wire form, e.g. `IN_PROGRESS`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::InProgress => "IN_PROGRESS",
            RegistrationStatus::Declared => "DECLARED",
            RegistrationStatus::Validated => "VALIDATED",
            RegistrationStatus::Registered => "REGISTERED",
            RegistrationStatus::Certified => "CERTIFIED",
            RegistrationStatus::Issued => "ISSUED",
            RegistrationStatus::Rejected => "REJECTED",
            RegistrationStatus::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string())).map_err(|_| {
            ValidationError::UnknownStatus {
                status: s.to_string(),
            }
            .into()
        })
    }
}

/// A snapshot of a finalized record.
///
/// Owned by the system of record; the core only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: ResourceKind,
    tracking_id: String,
    registration_number: Option<RegistrationNumber>,
    status: RegistrationStatus,
    fields: Map<String, Value>,
}

impl Record {
    /// Creates a record with the given kind, tracking id, and fields.
    ///
    /// # Errors
    ///
    /// * `ValidationError::EmptyTrackingId` - if `tracking_id` is empty
    pub fn new(
        kind: ResourceKind,
        tracking_id: impl Into<String>,
        fields: Map<String, Value>,
    ) -> CoreResult<Self> {
        let tracking_id = tracking_id.into();
        if tracking_id.is_empty() {
            return Err(ValidationError::EmptyTrackingId.into());
        }
        Ok(Self {
            kind,
            tracking_id,
            registration_number: None,
            status: RegistrationStatus::default(),
            fields,
        })
    }

    /// Validates an untyped payload into a record.
    ///
    /// Reserved keys are `resourceType`, `trackingId`, `registrationNumber`,
    /// and `status`; every other key becomes a record field.
    ///
    /// # Errors
    ///
    /// * `ValidationError::InvalidField` - payload is not an object or a reserved key has the wrong type
    /// * `ValidationError::UnknownResourceType` - unsupported `resourceType`
    /// * `ValidationError::UnknownStatus` - unrecognized `status`
    /// * `ValidationError::EmptyTrackingId` - empty `trackingId`
    pub fn from_json(value: Value) -> CoreResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(invalid_field("<root>", "expected a JSON object"));
        };

        let kind: ResourceKind = take_string(&mut fields, "resourceType")?
            .ok_or_else(|| invalid_field("resourceType", "missing"))?
            .parse()?;

        let tracking_id = take_string(&mut fields, "trackingId")?
            .ok_or_else(|| invalid_field("trackingId", "missing"))?;

        let registration_number = match take_string(&mut fields, "registrationNumber")? {
            Some(n) if n.is_empty() => {
                return Err(invalid_field("registrationNumber", "must not be empty"));
            }
            Some(n) => Some(RegistrationNumber::from_issued(n)),
            None => None,
        };

        let status = match take_string(&mut fields, "status")? {
            Some(s) => s.parse()?,
            None => RegistrationStatus::default(),
        };

        let mut record = Record::new(kind, tracking_id, fields)?;
        record.registration_number = registration_number;
        record.status = status;
        Ok(record)
    }

    /// Sets the workflow status.
    pub fn with_status(mut self, status: RegistrationStatus) -> Self {
        self.status = status;
        self
    }

    /// Attaches a previously issued registration number.
    pub fn with_registration_number(mut self, number: RegistrationNumber) -> Self {
        self.registration_number = Some(number);
        self
    }

    /// Returns the resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns the tracking id.
    pub fn tracking_id(&self) -> &str {
        &self.tracking_id
    }

    /// Returns the stored registration number, if one was issued.
    pub fn registration_number(&self) -> Option<&RegistrationNumber> {
        self.registration_number.as_ref()
    }

    /// Returns the workflow status.
    pub fn status(&self) -> RegistrationStatus {
        self.status
    }

    /// Returns the record fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Looks up a field by dotted path, e.g. `period.start` or `name.0.family`.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns the kind-specific event date, if present and parseable.
    pub fn event_date(&self) -> Option<DateTime<Utc>> {
        let raw = self.field(self.kind.date_field()?)?.as_str()?;
        parse_fhir_date(raw)
    }
}

impl TryFrom<Value> for Record {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Record::from_json(value)
    }
}

/// Parses a FHIR `dateTime` or `date` (`YYYY`, `YYYY-MM`, `YYYY-MM-DD`).
///
/// Partial dates resolve to the start of the period, at midnight UTC.
pub fn parse_fhir_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let padded = match raw.len() {
        4 => format!("{}-01-01", raw),
        7 => format!("{}-01", raw),
        _ => raw.to_string(),
    };
    NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn invalid_field(field: &str, message: &str) -> CoreError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> CoreResult<Option<String>> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(invalid_field(key, "expected a string")),
    }
}
