//! # OxO Loader
//!
//! The main binary for loading the OxO cross-reference graph.
//!
//! ## Usage
//!
//! ```bash
//! # Preprocess a raw mapping file, wipe the store and load everything
//! oxo-loader --store redb://oxo.redb load -W --sssom mondo.sssom.tsv
//!
//! # Load pre-normalized tables stage by stage
//! oxo-loader load -d terms.tsv -t terms.tsv -m mappings.tsv
//!
//! # Inspect the store
//! oxo-loader status
//! oxo-loader query MONDO:0005015 --distance 2
//! ```

use clap::Parser;
use oxo_loader::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // OXO_LOG_FORMAT=json enables machine-parseable output. Logs go to stderr
    // so --json-mode output on stdout stays clean.
    let log_format = std::env::var("OXO_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "oxo_loader=debug,oxo_core=debug"
    } else {
        "oxo_loader=info,oxo_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
