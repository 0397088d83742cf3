//! Per-call timeouts for shared dependencies.

use std::future::Future;
use std::time::Duration;

use crate::error::{CoreResult, Dependency, DependencyError};

/// Runs `future` under `timeout`, mapping expiry to [`DependencyError::Timeout`].
pub(crate) async fn with_timeout<T, F>(
    dependency: Dependency,
    timeout: Duration,
    future: F,
) -> CoreResult<T>
where
    F: Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(%dependency, timeout_ms = timeout.as_millis() as u64, "Dependency call timed out");
            Err(DependencyError::Timeout {
                dependency,
                timeout_ms: timeout.as_millis() as u64,
            }
            .into())
        }
    }
}
