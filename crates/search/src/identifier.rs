//! Registration number generation.
//!
//! A registration number is the four-digit year of issuance followed by the
//! record's tracking id, with no separator: tracking id `B7XK2Q1` issued in
//! 2024 becomes `2024B7XK2Q1`. The year is taken at generation time, so a
//! number issued once must be stored and reused; regenerating it later could
//! yield a different year.
//!
//! Uniqueness rests on tracking ids being unique. Two sources that reuse a
//! tracking id in the same year would mint colliding numbers; this module
//! does not detect that.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A year-prefixed registration number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationNumber(String);

impl RegistrationNumber {
    /// Wraps a previously issued number read back from storage.
    pub fn from_issued(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the year prefix, if the number is well formed.
    pub fn year(&self) -> Option<i32> {
        self.0.get(..4).and_then(|y| y.parse().ok())
    }

    /// Returns the tracking id suffix.
    pub fn tracking_id(&self) -> &str {
        self.0.get(4..).unwrap_or_default()
    }

    /// Consumes the number, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RegistrationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RegistrationNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Mints registration numbers from tracking ids.
#[derive(Clone)]
pub struct RegistrationNumberGenerator {
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RegistrationNumberGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationNumberGenerator")
            .finish_non_exhaustive()
    }
}

impl Default for RegistrationNumberGenerator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl RegistrationNumberGenerator {
    /// Creates a generator reading the year from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Derives `<year><tracking_id>` using the current year.
    ///
    /// This only computes a candidate. Issuance is final once the candidate
    /// has been stored with an assign-if-absent write.
    ///
    /// # Errors
    ///
    /// * `ValidationError::EmptyTrackingId` - if `tracking_id` is empty
    pub async fn generate(&self, tracking_id: &str) -> CoreResult<RegistrationNumber> {
        if tracking_id.is_empty() {
            return Err(ValidationError::EmptyTrackingId.into());
        }

        let year = self.clock.now().year();
        Ok(RegistrationNumber(format!("{:04}{}", year, tracking_id)))
    }
}
