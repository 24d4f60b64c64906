//! # OxO Loader CLI Module
//!
//! ## Available Commands
//!
//! - `load` - Wipe, preprocess and load (`-W`, `--sssom`, `-d`, `-t`, `-m`)
//! - `preprocess` - Normalize a raw mapping table without touching the store
//! - `wipe` - Clear the store in bounded batches
//! - `status` - Show per-kind counts
//! - `query` - Search mappings from a curie
//! - `init` - Create the uniqueness constraints

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use oxo_core::{OxoError, PipelineMode};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// OxO loader
///
/// Loads ontology terms, datasources and cross-reference mappings into a
/// graph store.
#[derive(Parser, Debug)]
#[command(name = "oxo-loader")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file (default: oxo.toml if present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Store URL: "memory:", "redb://<path>" or a file path
    #[arg(short = 'S', long, global = true)]
    pub store: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Preprocessing mode as spelled on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Curie expansion, identifiers, datasource, date and scope
    Legacy,
    /// Curie expansion only
    ExpandOnly,
}

impl From<ModeArg> for PipelineMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Legacy => Self::Legacy,
            ModeArg::ExpandOnly => Self::ExpandOnly,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Wipe, preprocess and load in one run
    Load {
        /// Delete everything in the store first
        #[arg(short = 'W', long)]
        wipe: bool,

        /// Datasource table
        #[arg(short = 'd', long)]
        datasources: Option<PathBuf>,

        /// Term table
        #[arg(short = 't', long)]
        terms: Option<PathBuf>,

        /// Mapping table
        #[arg(short = 'm', long)]
        mappings: Option<PathBuf>,

        /// Raw mapping file to preprocess; feeds every stage not given explicitly
        #[arg(long)]
        sssom: Option<PathBuf>,

        /// Where to write the normalized table (default: <sssom>.normalized.tsv)
        #[arg(long, requires = "sssom")]
        normalized: Option<PathBuf>,

        /// External metadata (path or http(s) URL) merged over the embedded header
        #[arg(long, requires = "sssom")]
        metadata: Option<String>,

        /// Preprocessing mode (default from config, else legacy)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Preprocess a raw mapping table
    Preprocess {
        /// Raw mapping file
        #[arg(short, long)]
        input: PathBuf,

        /// Normalized output table
        #[arg(short, long)]
        output: PathBuf,

        /// Metadata sidecar path (default: <output>.metadata.yml)
        #[arg(long)]
        metadata_out: Option<PathBuf>,

        /// External metadata (path or http(s) URL) merged over the embedded header
        #[arg(long)]
        metadata: Option<String>,

        /// Preprocessing mode (default from config, else legacy)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Delete every mapping, source link, term and datasource
    Wipe,

    /// Show store status
    Status,

    /// Search mappings reachable from a curie
    Query {
        /// Curie to start from
        curie: String,

        /// Maximum number of mapping hops (1-3)
        #[arg(short, long, default_value = "1")]
        distance: usize,
    },

    /// Create the uniqueness constraints
    Init,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), OxoError> {
    let config = load_config(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Load {
            wipe,
            datasources,
            terms,
            mappings,
            sssom,
            normalized,
            metadata,
            mode,
        } => {
            let request = LoadRequest {
                wipe,
                datasources,
                terms,
                mappings,
                sssom,
                normalized,
                metadata,
                mode: mode.map(PipelineMode::from),
            };
            cmd_load(&config, json_mode, request).await
        }
        Commands::Preprocess {
            input,
            output,
            metadata_out,
            metadata,
            mode,
        } => {
            let request = PreprocessRequest {
                input,
                output,
                metadata_out,
                metadata,
                mode: mode.map(PipelineMode::from),
            };
            cmd_preprocess(&config, json_mode, request).await
        }
        Commands::Wipe => cmd_wipe(&config, json_mode),
        Commands::Status => cmd_status(&config, json_mode),
        Commands::Query { curie, distance } => cmd_query(&config, json_mode, &curie, distance),
        Commands::Init => cmd_init(&config, json_mode),
    }
}
