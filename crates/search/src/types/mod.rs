//! Core types for records, index documents, and search.
//!
//! - [`record`] - Validated record snapshots and their closed enums
//! - [`document`] - The normalized document written to the index
//! - [`criteria`] - Search requests and backend-independent results

pub mod criteria;
pub mod document;
pub mod record;

pub use criteria::{DateRange, SearchCriteria, SearchResults};
pub use document::IndexDocument;
pub use record::{Record, RegistrationStatus, ResourceKind, parse_fhir_date};
