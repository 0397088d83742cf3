//! Token validator integration tests.

mod common;

use std::sync::Arc;

use civreg_search::auth::{MemoryInvalidationStore, TokenValidator, invalidation_key};
use civreg_search::config::CoreConfig;
use civreg_search::error::ErrorKind;

use common::*;

fn validator_over(store: Arc<CountingStore>) -> TokenValidator {
    TokenValidator::new(store, &CoreConfig::default())
}

#[tokio::test]
async fn test_token_without_entry_is_valid() {
    let store = CountingStore::new();
    let validator = validator_over(store.clone());

    assert!(validator.is_token_valid("abc").await.unwrap());
    assert_eq!(store.lookup_count(), 1);
}

#[tokio::test]
async fn test_revocation_visible_immediately() {
    let store = CountingStore::new();
    let validator = validator_over(store.clone());

    assert!(validator.is_token_valid("abc").await.unwrap());
    store.revoke("invalidToken", "abc");
    assert!(!validator.is_token_valid("abc").await.unwrap());
    assert!(validator.is_token_valid("other").await.unwrap());
    assert_eq!(store.lookup_count(), 3);
}

#[tokio::test]
async fn test_lookup_uses_configured_namespace() {
    let store = Arc::new(MemoryInvalidationStore::new());
    let config = CoreConfig {
        invalidation_namespace: "revoked".to_string(),
        ..Default::default()
    };
    let validator = TokenValidator::new(store.clone(), &config);

    store.invalidate(invalidation_key("invalidToken", "abc"));
    assert!(validator.is_token_valid("abc").await.unwrap());

    store.invalidate("revoked:abc");
    assert!(!validator.is_token_valid("abc").await.unwrap());
}

#[tokio::test]
async fn test_unreachable_store_propagates() {
    let validator = TokenValidator::new(Arc::new(UnreachableStore), &CoreConfig::default());

    assert_kind(
        validator.is_token_valid("abc").await,
        ErrorKind::DependencyUnavailable,
    );
    assert_kind(
        validator.authorize("abc").await,
        ErrorKind::DependencyUnavailable,
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out() {
    let validator = TokenValidator::new(Arc::new(HangingStore), &test_config());

    assert_kind(
        validator.is_token_valid("abc").await,
        ErrorKind::DependencyTimeout,
    );
}

#[tokio::test]
async fn test_empty_token_rejected_without_lookup() {
    let store = CountingStore::new();
    let validator = validator_over(store.clone());

    assert_kind(validator.authorize("").await, ErrorKind::Unauthorized);
    assert_kind(validator.authorize("   ").await, ErrorKind::Unauthorized);
    assert_eq!(store.lookup_count(), 0);
}

#[tokio::test]
async fn test_concurrent_checks() {
    let store = CountingStore::new();
    store.revoke("invalidToken", "t3");
    let validator = validator_over(store.clone());

    let checks = (0..8).map(|i| {
        let validator = validator.clone();
        tokio::spawn(async move { validator.is_token_valid(&format!("t{}", i)).await })
    });
    let results: Vec<bool> = futures::future::join_all(checks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|valid| !**valid).count(), 1);
    assert!(!results[3]);
    assert_eq!(store.lookup_count(), 8);
}
