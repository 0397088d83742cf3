//! civreg-indexer
//!
//! Backfills and queries the civil registration search index.
//!
//! # Usage
//!
//! ```bash
//! # Index an export into Elasticsearch
//! CIVREG_TOKEN=... civreg-indexer --backend elasticsearch backfill --input births.ndjson
//!
//! # Search, seeding an in-memory index first
//! civreg-indexer --token t search --seed births.ndjson --text "Kofi Mensah"
//! ```
//!
//! # Environment Variables
//!
//! - `CIVREG_TOKEN` - Bearer token presented for every operation
//! - `CIVREG_BACKEND` - `memory` (default) or `elasticsearch`
//! - `CIVREG_ES_NODES` - Elasticsearch URLs (default: http://localhost:9200)
//! - `CIVREG_CHUNK_LIMIT` - Documents per bulk write (default: 250)
//! - `CIVREG_BACKEND_TIMEOUT` - Per-call timeout (default: 5s)
//! - `CIVREG_LOG_LEVEL` - Log level (default: info)

use clap::Parser;
use tracing::info;

use civreg_indexer::{
    Command, IndexerConfig, backfill, build_backend, build_service, init_logging, search,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = IndexerConfig::parse();

    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        version = civreg_search::VERSION,
        backend = ?config.backend,
        "Starting civreg-indexer"
    );

    let backend = build_backend(&config).await?;
    let service = build_service(&config, backend)?;

    match &config.command {
        Command::Backfill(args) => {
            let retry = service.config().retry.clone();
            let retry = (!args.no_retry).then_some(&retry);
            let report = backfill::run(&service, &config.token, &args.input, retry).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_clean() {
                std::process::exit(2);
            }
        }
        Command::Search(args) => {
            if let Some(seed) = &args.seed {
                let report = backfill::run(&service, &config.token, seed, None).await?;
                info!(
                    indexed = report.summary.succeeded.len(),
                    failed = report.remaining_failures(),
                    "Seeded index"
                );
            }
            let results = search::run(&service, &config.token, args).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}
