//! Invalidation store interface and in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::CoreResult;

/// Builds the store key for a token: `{namespace}:{token}`.
pub fn invalidation_key(namespace: &str, token: &str) -> String {
    format!("{}:{}", namespace, token)
}

/// Read interface of the shared key-value invalidation store.
///
/// Implementations must report an unreachable store as
/// [`DependencyError::Unavailable`](crate::error::DependencyError::Unavailable)
/// rather than as a missing key.
#[async_trait]
pub trait InvalidationStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;
}

/// In-process invalidation store.
///
/// Suitable for single-process deployments and tests. Entries never expire.
#[derive(Debug, Default)]
pub struct MemoryInvalidationStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryInvalidationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` as revoked.
    pub fn invalidate(&self, key: impl Into<String>) {
        self.entries.write().insert(key.into(), "1".to_string());
    }

    /// Revokes `token` under `namespace`.
    pub fn invalidate_token(&self, namespace: &str, token: &str) {
        self.invalidate(invalidation_key(namespace, token));
    }

    /// Removes an entry, returning whether one existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl InvalidationStore for MemoryInvalidationStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }
}
