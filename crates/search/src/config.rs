//! Core configuration.
//!
//! All tunables are passed explicitly to each component at construction;
//! nothing is read from ambient globals or the environment here.
//!
//! # Example
//!
//! ```
//! use civreg_search::config::CoreConfig;
//!
//! let config: CoreConfig = serde_json::from_str(
//!     r#"{ "invalidation_namespace": "revoked", "index_chunk_limit": 100 }"#,
//! ).unwrap();
//! assert_eq!(config.index_chunk_limit, 100);
//! assert_eq!(config.bulk_concurrency, 4);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by the validator, indexer, and query service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Key prefix for revoked tokens in the invalidation store.
    /// Keys are built as `{namespace}:{token}`.
    #[serde(default = "default_invalidation_namespace")]
    pub invalidation_namespace: String,

    /// Maximum documents per bulk write.
    #[serde(default = "default_index_chunk_limit")]
    pub index_chunk_limit: usize,

    /// Maximum bulk chunks in flight at once.
    #[serde(default = "default_bulk_concurrency")]
    pub bulk_concurrency: usize,

    /// Timeout applied to every store lookup, index write, and query.
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,

    /// Page size used when criteria do not specify a count.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Largest page a single search may request.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Deepest hit (`offset + count`) a search may reach.
    #[serde(default = "default_max_result_window")]
    pub max_result_window: usize,

    /// Retry policy for transient index failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_invalidation_namespace() -> String {
    "invalidToken".to_string()
}

fn default_index_chunk_limit() -> usize {
    250
}

fn default_bulk_concurrency() -> usize {
    4
}

fn default_backend_timeout_ms() -> u64 {
    5000
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    500
}

fn default_max_result_window() -> usize {
    10000
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            invalidation_namespace: default_invalidation_namespace(),
            index_chunk_limit: default_index_chunk_limit(),
            bulk_concurrency: default_bulk_concurrency(),
            backend_timeout_ms: default_backend_timeout_ms(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_result_window: default_max_result_window(),
            retry: RetryConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Returns the per-call backend timeout.
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.invalidation_namespace.is_empty() {
            errors.push("Invalidation namespace cannot be empty".to_string());
        }

        if self.invalidation_namespace.contains(':') {
            errors.push("Invalidation namespace cannot contain ':'".to_string());
        }

        if self.index_chunk_limit == 0 {
            errors.push("Index chunk limit must be positive".to_string());
        }

        if self.bulk_concurrency == 0 {
            errors.push("Bulk concurrency must be positive".to_string());
        }

        if self.backend_timeout_ms == 0 {
            errors.push("Backend timeout cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if self.max_page_size > self.max_result_window {
            errors.push("Max page size cannot exceed the max result window".to_string());
        }

        if self.retry.backoff_multiplier.is_nan() || self.retry.backoff_multiplier < 1.0 {
            errors.push("Retry backoff multiplier must be at least 1.0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Exponential backoff policy for retrying transient failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on the delay between retries, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Returns the initial delay.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Returns the delay that follows `current`, capped at the maximum.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let max = Duration::from_millis(self.max_delay_ms);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .map_or(max, |next| next.min(max))
    }
}
