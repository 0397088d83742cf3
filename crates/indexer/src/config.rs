//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use civreg_search::chunk::chunk_limit;
use civreg_search::config::{CoreConfig, RetryConfig};
use civreg_search::error::CoreResult;

/// Which search backend to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// In-process index, discarded on exit.
    #[default]
    Memory,
    /// Elasticsearch cluster.
    Elasticsearch,
}

/// Operator tool for the civil registration search index.
#[derive(Debug, Clone, Parser)]
#[command(name = "civreg-indexer")]
#[command(about = "Backfill and query the civil registration search index")]
pub struct IndexerConfig {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "CIVREG_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Search backend.
    #[arg(long, env = "CIVREG_BACKEND", value_enum, default_value = "memory", global = true)]
    pub backend: BackendKind,

    /// Elasticsearch node URLs, comma separated.
    #[arg(
        long,
        env = "CIVREG_ES_NODES",
        value_delimiter = ',',
        default_value = "http://localhost:9200",
        global = true
    )]
    pub elasticsearch_nodes: Vec<String>,

    /// Prefix for Elasticsearch index names.
    #[arg(long, env = "CIVREG_ES_INDEX_PREFIX", default_value = "civreg", global = true)]
    pub index_prefix: String,

    /// Elasticsearch username for basic auth.
    #[arg(long, env = "CIVREG_ES_USERNAME", global = true)]
    pub elasticsearch_username: Option<String>,

    /// Elasticsearch password for basic auth.
    #[arg(long, env = "CIVREG_ES_PASSWORD", global = true, hide_env_values = true)]
    pub elasticsearch_password: Option<String>,

    /// Bearer token presented for every operation.
    #[arg(long, env = "CIVREG_TOKEN", global = true, hide_env_values = true, default_value = "")]
    pub token: String,

    /// Tokens to treat as revoked, comma separated.
    #[arg(long, env = "CIVREG_REVOKED_TOKENS", value_delimiter = ',', global = true)]
    pub revoked_tokens: Vec<String>,

    /// Key prefix for revoked tokens.
    #[arg(long, env = "CIVREG_INVALIDATION_NAMESPACE", default_value = "invalidToken", global = true)]
    pub invalidation_namespace: String,

    /// Maximum documents per bulk write.
    #[arg(
        long,
        env = "CIVREG_CHUNK_LIMIT",
        default_value_t = 250,
        allow_negative_numbers = true,
        global = true
    )]
    pub chunk_limit: i64,

    /// Maximum bulk chunks in flight.
    #[arg(long, env = "CIVREG_BULK_CONCURRENCY", default_value_t = 4, global = true)]
    pub bulk_concurrency: usize,

    /// Timeout for each backend call (e.g. "5s", "500ms").
    #[arg(
        long,
        env = "CIVREG_BACKEND_TIMEOUT",
        default_value = "5s",
        value_parser = humantime::parse_duration,
        global = true
    )]
    pub backend_timeout: Duration,

    /// Retries for records that fail with a transient error.
    #[arg(long, env = "CIVREG_MAX_RETRIES", default_value_t = 3, global = true)]
    pub max_retries: u32,

    /// Page size when a search does not set `--count`.
    #[arg(long, env = "CIVREG_DEFAULT_PAGE_SIZE", default_value_t = 20, global = true)]
    pub default_page_size: usize,

    /// Largest page a search may request.
    #[arg(long, env = "CIVREG_MAX_PAGE_SIZE", default_value_t = 500, global = true)]
    pub max_page_size: usize,

    /// Deepest hit a search may page to; match the backend's result window.
    #[arg(long, env = "CIVREG_MAX_RESULT_WINDOW", default_value_t = 10000, global = true)]
    pub max_result_window: usize,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Index records from a newline-delimited JSON file.
    Backfill(BackfillArgs),
    /// Run a search and print the results as JSON.
    Search(SearchArgs),
}

/// Arguments for `backfill`.
#[derive(Debug, Clone, Args)]
pub struct BackfillArgs {
    /// NDJSON file with one record per line.
    #[arg(long, short)]
    pub input: PathBuf,

    /// Do not retry records that failed with a transient error.
    #[arg(long)]
    pub no_retry: bool,
}

/// Arguments for `search`.
#[derive(Debug, Clone, Default, Args)]
pub struct SearchArgs {
    /// Resource type, e.g. `Composition` or `Patient`.
    #[arg(long)]
    pub resource_type: Option<String>,

    /// Exact tracking id.
    #[arg(long)]
    pub tracking_id: Option<String>,

    /// Exact registration number.
    #[arg(long)]
    pub registration_number: Option<String>,

    /// Accepted statuses, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<String>,

    /// Earliest event date (inclusive).
    #[arg(long)]
    pub from: Option<String>,

    /// Latest event date (inclusive).
    #[arg(long)]
    pub to: Option<String>,

    /// Free-text terms.
    #[arg(long)]
    pub text: Option<String>,

    /// Results to skip.
    #[arg(long)]
    pub offset: Option<usize>,

    /// Results to return.
    #[arg(long)]
    pub count: Option<usize>,

    /// Index this NDJSON file before searching. Useful with the memory backend.
    #[arg(long)]
    pub seed: Option<PathBuf>,
}

impl IndexerConfig {
    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.token.trim().is_empty() {
            errors.push("A bearer token is required (--token or CIVREG_TOKEN)".to_string());
        }

        if let Err(e) = chunk_limit(self.chunk_limit) {
            errors.push(e.to_string());
        }

        if self.bulk_concurrency == 0 {
            errors.push("Bulk concurrency must be positive".to_string());
        }

        if self.backend_timeout.is_zero() {
            errors.push("Backend timeout cannot be 0".to_string());
        }

        if self.backend == BackendKind::Elasticsearch {
            if self.elasticsearch_nodes.iter().all(|n| n.trim().is_empty()) {
                errors.push("At least one Elasticsearch node is required".to_string());
            }
            if self.elasticsearch_username.is_some() != self.elasticsearch_password.is_some() {
                errors.push(
                    "Elasticsearch username and password must be given together".to_string(),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Builds the core configuration shared by every component.
    pub fn core_config(&self) -> CoreResult<CoreConfig> {
        Ok(CoreConfig {
            invalidation_namespace: self.invalidation_namespace.clone(),
            index_chunk_limit: chunk_limit(self.chunk_limit)?,
            bulk_concurrency: self.bulk_concurrency,
            backend_timeout_ms: self.backend_timeout.as_millis() as u64,
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            max_result_window: self.max_result_window,
            retry: RetryConfig {
                max_retries: self.max_retries,
                ..RetryConfig::default()
            },
        })
    }

    /// Builds the Elasticsearch backend configuration.
    #[cfg(feature = "elasticsearch")]
    pub fn elasticsearch_config(
        &self,
    ) -> civreg_search::backend::elasticsearch::ElasticsearchConfig {
        use civreg_search::backend::elasticsearch::{ElasticsearchAuth, ElasticsearchConfig};

        let auth = match (&self.elasticsearch_username, &self.elasticsearch_password) {
            (Some(username), Some(password)) => Some(ElasticsearchAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        ElasticsearchConfig {
            nodes: self.elasticsearch_nodes.clone(),
            index_prefix: self.index_prefix.clone(),
            auth,
            ..ElasticsearchConfig::default()
        }
    }
}
