//! Bearer token validation.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::CoreConfig;
use crate::deadline::with_timeout;
use crate::error::{CoreError, CoreResult, Dependency};

use super::store::{InvalidationStore, invalidation_key};

/// Checks bearer tokens against the shared invalidation store.
///
/// Every call hits the store; results are never cached, so a revocation is
/// visible to the very next check. Store failures propagate as
/// `DependencyUnavailable` / `DependencyTimeout` and are never turned into an
/// allow or a deny.
#[derive(Clone)]
pub struct TokenValidator {
    store: Arc<dyn InvalidationStore>,
    namespace: String,
    timeout: Duration,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Creates a validator using the namespace and timeout from `config`.
    pub fn new(store: Arc<dyn InvalidationStore>, config: &CoreConfig) -> Self {
        Self {
            store,
            namespace: config.invalidation_namespace.clone(),
            timeout: config.backend_timeout(),
        }
    }

    /// Returns the namespace used to build store keys.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns `true` if no invalidation entry exists for `token`.
    pub async fn is_token_valid(&self, token: &str) -> CoreResult<bool> {
        let key = invalidation_key(&self.namespace, token);
        let entry = with_timeout(
            Dependency::InvalidationStore,
            self.timeout,
            self.store.get(&key),
        )
        .await?;
        Ok(entry.is_none())
    }

    /// Fails with [`CoreError::Unauthorized`] unless `token` is present and valid.
    pub async fn authorize(&self, token: &str) -> CoreResult<()> {
        if token.trim().is_empty() {
            debug!("Rejected empty bearer token");
            return Err(CoreError::Unauthorized);
        }

        if self.is_token_valid(token).await? {
            Ok(())
        } else {
            debug!("Rejected revoked bearer token");
            Err(CoreError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryInvalidationStore;
    use crate::error::ErrorKind;

    fn validator(store: Arc<MemoryInvalidationStore>) -> TokenValidator {
        TokenValidator::new(store, &CoreConfig::default())
    }

    #[tokio::test]
    async fn test_unknown_token_is_valid() {
        let validator = validator(Arc::new(MemoryInvalidationStore::new()));
        assert!(validator.is_token_valid("tok-1").await.unwrap());
        assert!(validator.authorize("tok-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_revocation_visible_immediately() {
        let store = Arc::new(MemoryInvalidationStore::new());
        let validator = validator(store.clone());

        assert!(validator.is_token_valid("tok-1").await.unwrap());
        store.invalidate_token("invalidToken", "tok-1");
        assert!(!validator.is_token_valid("tok-1").await.unwrap());
        assert!(validator.is_token_valid("tok-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_other_namespace_does_not_revoke() {
        let store = Arc::new(MemoryInvalidationStore::new());
        store.invalidate_token("someOtherNamespace", "tok-1");
        let validator = validator(store);
        assert!(validator.is_token_valid("tok-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_token_unauthorized() {
        let validator = validator(Arc::new(MemoryInvalidationStore::new()));
        let err = validator.authorize("  ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
