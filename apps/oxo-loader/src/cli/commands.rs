//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::Cli;
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::remote::fetch_metadata;
use oxo_core::primitives::MAX_SEARCH_DISTANCE;
use oxo_core::{
    IngestPlan, IngestReport, Orchestrator, OxoError, PipelineMode, PreprocessJob,
    PreprocessOptions, Session, UpsertLoader, preprocess_file, search_mappings,
};
use std::path::PathBuf;

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Resolve configuration: file, then environment, then `--store`.
pub fn load_config(cli: &Cli) -> Result<Config, OxoError> {
    let (path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    Ok(Config::load(&path, explicit)?
        .with_env(|key| std::env::var(key).ok())
        .with_store_url(cli.store.clone()))
}

/// Open the configured store. Fails before touching it if none is configured.
pub fn open_session(config: &Config) -> Result<Session, OxoError> {
    let locator = config.store_locator()?;
    tracing::info!("Using store {}", locator);
    Session::open(&locator)
}

/// Build preprocessing options, fetching external metadata if requested.
pub async fn preprocess_options(
    config: &Config,
    mode: Option<PipelineMode>,
    metadata: Option<&str>,
) -> Result<PreprocessOptions, OxoError> {
    let external_metadata = match metadata {
        Some(source) => Some(fetch_metadata(source).await?),
        None => None,
    };
    Ok(PreprocessOptions {
        mode: mode.unwrap_or_else(|| config.pipeline_mode()),
        source_type: config.datasource_defaults().source_type,
        external_metadata,
    })
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// LOAD COMMAND
// =============================================================================

/// Arguments of `load`.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    pub wipe: bool,
    pub datasources: Option<PathBuf>,
    pub terms: Option<PathBuf>,
    pub mappings: Option<PathBuf>,
    pub sssom: Option<PathBuf>,
    pub normalized: Option<PathBuf>,
    pub metadata: Option<String>,
    pub mode: Option<PipelineMode>,
}

/// Turn `load` arguments into an ingestion plan.
///
/// With `--sssom`, the normalized output feeds every stage that was not
/// given its own table.
pub async fn build_load_plan(
    config: &Config,
    request: LoadRequest,
) -> Result<IngestPlan, OxoError> {
    let preprocess = match request.sssom {
        Some(input) => {
            let output = request
                .normalized
                .unwrap_or_else(|| input.with_extension("normalized.tsv"));
            let options =
                preprocess_options(config, request.mode, request.metadata.as_deref()).await?;
            Some(PreprocessJob {
                input,
                output,
                metadata_out: None,
                options,
            })
        }
        None => None,
    };
    let normalized = preprocess.as_ref().map(|job| job.output.clone());

    Ok(IngestPlan {
        wipe: request.wipe,
        datasources: request.datasources.or_else(|| normalized.clone()),
        terms: request.terms.or_else(|| normalized.clone()),
        mappings: request.mappings.or(normalized),
        preprocess,
    })
}

/// Wipe, preprocess and load.
pub async fn cmd_load(
    config: &Config,
    json_mode: bool,
    request: LoadRequest,
) -> Result<(), OxoError> {
    let plan = build_load_plan(config, request).await?;
    if plan.is_empty() {
        return Err(OxoError::Configuration(
            "nothing to do: pass -W, -d, -t, -m or --sssom".to_string(),
        ));
    }

    let orchestrator = Orchestrator::default()
        .with_loader(config.upsert_loader())
        .with_wipe_controller(config.wipe_controller());
    let report = if plan.needs_store() {
        let mut session = open_session(config)?;
        orchestrator.run(&plan, Some(session.store_mut()))?
    } else {
        orchestrator.run(&plan, None)?
    };

    if json_mode {
        print_json(&report);
    } else {
        print_ingest_report(&report);
    }
    Ok(())
}

fn print_ingest_report(report: &IngestReport) {
    println!("OxO Load");
    println!("========");
    if report.constraints_created > 0 {
        println!("Constraints created: {}", report.constraints_created);
    }
    if let Some(wipe) = &report.wipe {
        println!("Wiped:        {} elements in {} batches", wipe.total(), wipe.batches);
    }
    if let Some(pre) = &report.preprocess {
        println!(
            "Preprocessed: {} rows ({}) -> {}",
            pre.rows,
            pre.mode,
            pre.output.display()
        );
    }
    for stage in &report.stages {
        println!("{:<13} {} rows: {}", format!("{}:", stage.stage), stage.rows, stage.merges);
        if let Some(links) = stage.source_links {
            println!("{:<13} {}", "source links:", links);
        }
    }
}

// =============================================================================
// PREPROCESS COMMAND
// =============================================================================

/// Arguments of `preprocess`.
#[derive(Debug, Clone)]
pub struct PreprocessRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub metadata_out: Option<PathBuf>,
    pub metadata: Option<String>,
    pub mode: Option<PipelineMode>,
}

/// Normalize a raw mapping table into a loadable one.
pub async fn cmd_preprocess(
    config: &Config,
    json_mode: bool,
    request: PreprocessRequest,
) -> Result<(), OxoError> {
    let options = preprocess_options(config, request.mode, request.metadata.as_deref()).await?;
    let report = preprocess_file(
        &request.input,
        &request.output,
        request.metadata_out.as_deref(),
        &options,
    )?;

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Preprocessed {} rows ({})", report.rows, report.mode);
    println!("Table:    {}", report.output.display());
    println!("Metadata: {}", report.metadata_path.display());
    Ok(())
}

// =============================================================================
// WIPE COMMAND
// =============================================================================

/// Delete everything from the store.
pub fn cmd_wipe(config: &Config, json_mode: bool) -> Result<(), OxoError> {
    let mut session = open_session(config)?;
    let report = config.wipe_controller().wipe(session.store_mut())?;

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Wiped {} elements in {} batches", report.total(), report.batches);
    for (kind, deleted) in &report.deleted {
        println!("  {:<13} {}", format!("{}:", kind), deleted);
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show per-kind counts.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), OxoError> {
    let session = open_session(config)?;
    let counts = session.counts()?;
    let constraints: Vec<String> = session
        .store()
        .constraints()?
        .iter()
        .map(|c| c.name())
        .collect();

    if json_mode {
        let output = serde_json::json!({
            "store": session.locator().to_string(),
            "persistent": session.is_persistent(),
            "counts": counts,
            "constraints": constraints,
        });
        print_json(&output);
        return Ok(());
    }

    println!("OxO Store Status");
    println!("================");
    println!("Store: {}", session.locator());
    println!();
    for (kind, count) in &counts {
        println!("{:<13} {}", format!("{}:", kind), count);
    }
    println!();
    if constraints.is_empty() {
        println!("Constraints:  none (run `oxo-loader init`)");
    } else {
        println!("Constraints:  {}", constraints.join(", "));
    }
    Ok(())
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Search mappings from a curie.
pub fn cmd_query(
    config: &Config,
    json_mode: bool,
    curie: &str,
    distance: usize,
) -> Result<(), OxoError> {
    if distance > MAX_SEARCH_DISTANCE {
        tracing::warn!(
            "Distance {} exceeds the maximum, using {}",
            distance,
            MAX_SEARCH_DISTANCE
        );
    }
    let session = open_session(config)?;
    let results = search_mappings(session.store(), curie, distance)?;

    if json_mode {
        print_json(&results);
        return Ok(());
    }

    if results.is_empty() {
        println!("No mappings found for {}", curie);
        return Ok(());
    }
    println!("Mappings for {}", curie);
    for r in &results {
        println!(
            "  [{}] {} ({}) {} scope={} via {}",
            r.distance,
            r.curie,
            r.target_prefix,
            r.label.as_deref().unwrap_or("-"),
            r.scope.map(|s| s.as_str()).unwrap_or("-"),
            r.source_prefixes
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(",")
        );
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the uniqueness constraints.
pub fn cmd_init(config: &Config, json_mode: bool) -> Result<(), OxoError> {
    let mut session = open_session(config)?;
    let created = UpsertLoader::ensure_constraints(session.store_mut())?;

    if json_mode {
        print_json(&serde_json::json!({
            "store": session.locator().to_string(),
            "constraints_created": created,
        }));
        return Ok(());
    }

    println!(
        "Store {} ready ({} constraints created)",
        session.locator(),
        created
    );
    Ok(())
}
