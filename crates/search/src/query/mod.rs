//! Access-gated search.
//!
//! Each request moves through a fixed set of phases:
//!
//! ```text
//! Received -> Authorizing -> Authorized -> Querying -> Responding
//!                         \-> Unauthorized -> Rejected
//! ```
//!
//! Authorization always completes before criteria are looked at, so a
//! rejected caller gets the same answer whether or not matching records
//! exist. Results reflect whatever the backend has made visible; there is no
//! read-your-writes guarantee beyond the backend's own refresh latency.

mod translate;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::TokenValidator;
use crate::backend::SearchBackend;
use crate::config::CoreConfig;
use crate::deadline::with_timeout;
use crate::error::{CoreError, CoreResult, Dependency};
use crate::types::{SearchCriteria, SearchResults};

pub use translate::QueryTranslator;

/// The lifecycle phase of a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// The request has arrived.
    Received,
    /// The token is being checked.
    Authorizing,
    /// The token is valid.
    Authorized,
    /// The token is missing or revoked.
    Unauthorized,
    /// The backend query is running.
    Querying,
    /// Results are being mapped for the caller.
    Responding,
    /// The request was refused.
    Rejected,
}

impl SearchPhase {
    /// Returns `true` if a request may move from `self` to `next`.
    pub fn can_advance_to(self, next: SearchPhase) -> bool {
        use SearchPhase::*;
        matches!(
            (self, next),
            (Received, Authorizing)
                | (Authorizing, Authorized)
                | (Authorizing, Unauthorized)
                | (Authorized, Querying)
                | (Querying, Responding)
                | (Unauthorized, Rejected)
        )
    }

    /// Returns `true` for phases with no successor.
    pub fn is_terminal(self) -> bool {
        matches!(self, SearchPhase::Responding | SearchPhase::Rejected)
    }
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchPhase::Received => "received",
            SearchPhase::Authorizing => "authorizing",
            SearchPhase::Authorized => "authorized",
            SearchPhase::Unauthorized => "unauthorized",
            SearchPhase::Querying => "querying",
            SearchPhase::Responding => "responding",
            SearchPhase::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the phase of one request.
struct RequestTrace {
    request_id: Uuid,
    phase: SearchPhase,
}

impl RequestTrace {
    fn new() -> Self {
        let trace = Self {
            request_id: Uuid::new_v4(),
            phase: SearchPhase::Received,
        };
        debug!(request_id = %trace.request_id, phase = %trace.phase, "Search request");
        trace
    }

    fn advance(&mut self, next: SearchPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "invalid search transition {} -> {}",
            self.phase,
            next
        );
        self.phase = next;
        debug!(request_id = %self.request_id, phase = %next, "Search request");
    }
}

/// Runs authorized searches against a [`SearchBackend`].
pub struct QueryService {
    validator: TokenValidator,
    backend: Arc<dyn SearchBackend>,
    translator: QueryTranslator,
    timeout: Duration,
}

impl fmt::Debug for QueryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryService")
            .field("backend", &self.backend.name())
            .field("translator", &self.translator)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl QueryService {
    /// Creates a query service.
    pub fn new(
        validator: TokenValidator,
        backend: Arc<dyn SearchBackend>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            validator,
            backend,
            translator: QueryTranslator::new(config),
            timeout: config.backend_timeout(),
        }
    }

    /// Authorizes `token`, then runs `criteria` against the backend.
    ///
    /// # Errors
    ///
    /// * `Unauthorized` - the token is missing or revoked; the backend is not called
    /// * `DependencyUnavailable` / `DependencyTimeout` - the store or backend failed
    /// * `InvalidArgument` / `UnsupportedQuery` - the criteria are rejected
    pub async fn search(&self, token: &str, criteria: &SearchCriteria) -> CoreResult<SearchResults> {
        let mut trace = RequestTrace::new();

        trace.advance(SearchPhase::Authorizing);
        match self.validator.authorize(token).await {
            Ok(()) => trace.advance(SearchPhase::Authorized),
            Err(CoreError::Unauthorized) => {
                trace.advance(SearchPhase::Unauthorized);
                trace.advance(SearchPhase::Rejected);
                return Err(CoreError::Unauthorized);
            }
            Err(e) => {
                warn!(request_id = %trace.request_id, error = %e, "Authorization check failed");
                return Err(e);
            }
        }

        let query = self.translator.translate(criteria)?;

        trace.advance(SearchPhase::Querying);
        let hits = with_timeout(
            Dependency::SearchBackend,
            self.timeout,
            self.backend.query(&query),
        )
        .await?;

        trace.advance(SearchPhase::Responding);
        debug!(
            request_id = %trace.request_id,
            total = hits.total,
            returned = hits.documents.len(),
            "Search complete"
        );
        Ok(SearchResults {
            items: hits.documents,
            total: hits.total,
        })
    }
}
