//! # CLI Tests
//!
//! Argument parsing, plan building and full command runs against a
//! temporary redb store.

#![allow(clippy::panic)]

use clap::Parser;
use oxo_core::{EntityKind, OxoError, PipelineMode, Session};
use oxo_loader::cli::{Cli, Commands, LoadRequest, ModeArg, build_load_plan, execute};
use oxo_loader::config::Config;
use std::path::{Path, PathBuf};

const RAW: &str = "#curie_map:\n\
#  MONDO: http://purl.obolibrary.org/obo/MONDO_\n\
#mapping_date: 2023-01-15\n\
subject_id\tsubject_label\tsubject_source\tpredicate_id\tobject_id\tobject_label\tobject_source\n\
MONDO:0005015\tdiabetes mellitus\tMONDO\towl:equivalentClass\tDOID:9351\tdiabetes mellitus\tDOID\n\
MONDO:0004979\tasthma\tMONDO\tskos:closeMatch\tDOID:2841\tasthma\tDOID\n";

fn write_raw(dir: &Path) -> PathBuf {
    let path = dir.join("mondo.sssom.tsv");
    std::fs::write(&path, RAW).expect("write raw");
    path
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("parse")
}

// =============================================================================
// PARSING
// =============================================================================

#[test]
fn load_accepts_short_flags() {
    let cli = parse(&[
        "oxo-loader", "load", "-W", "-d", "ds.tsv", "-t", "terms.tsv", "-m", "map.tsv",
    ]);

    match cli.command {
        Commands::Load {
            wipe,
            datasources,
            terms,
            mappings,
            sssom,
            ..
        } => {
            assert!(wipe);
            assert_eq!(datasources, Some(PathBuf::from("ds.tsv")));
            assert_eq!(terms, Some(PathBuf::from("terms.tsv")));
            assert_eq!(mappings, Some(PathBuf::from("map.tsv")));
            assert_eq!(sssom, None);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn global_flags_work_after_subcommand() {
    let cli = parse(&["oxo-loader", "status", "--store", "memory:", "--json-mode", "-c", "x.toml"]);

    assert_eq!(cli.store.as_deref(), Some("memory:"));
    assert!(cli.json_mode);
    assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
}

#[test]
fn mode_parses_kebab_case() {
    let cli = parse(&["oxo-loader", "preprocess", "-i", "in.tsv", "-o", "out.tsv", "--mode", "expand-only"]);

    match cli.command {
        Commands::Preprocess { mode, .. } => assert_eq!(mode, Some(ModeArg::ExpandOnly)),
        other => panic!("unexpected command {other:?}"),
    }
    assert_eq!(PipelineMode::from(ModeArg::Legacy), PipelineMode::Legacy);
}

#[test]
fn normalized_requires_sssom() {
    let result = Cli::try_parse_from(["oxo-loader", "load", "--normalized", "out.tsv"]);
    assert!(result.is_err());
}

#[test]
fn query_defaults_to_distance_one() {
    let cli = parse(&["oxo-loader", "query", "MONDO:0005015"]);

    match cli.command {
        Commands::Query { curie, distance } => {
            assert_eq!(curie, "MONDO:0005015");
            assert_eq!(distance, 1);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

// =============================================================================
// PLANNING
// =============================================================================

#[tokio::test]
async fn sssom_feeds_every_missing_stage() {
    let request = LoadRequest {
        sssom: Some(PathBuf::from("data/mondo.sssom.tsv")),
        terms: Some(PathBuf::from("terms.tsv")),
        ..LoadRequest::default()
    };

    let plan = build_load_plan(&Config::default(), request)
        .await
        .expect("plan");

    let normalized = PathBuf::from("data/mondo.sssom.normalized.tsv");
    assert_eq!(plan.datasources.as_ref(), Some(&normalized));
    assert_eq!(plan.terms, Some(PathBuf::from("terms.tsv")));
    assert_eq!(plan.mappings.as_ref(), Some(&normalized));
    let job = plan.preprocess.expect("preprocess job");
    assert_eq!(job.output, normalized);
    assert_eq!(job.options.mode, PipelineMode::Legacy);
}

#[tokio::test]
async fn external_metadata_is_resolved_while_planning() {
    let temp = tempfile::tempdir().expect("temp dir");
    let meta = temp.path().join("meta.yml");
    std::fs::write(&meta, "mapping_date: 2024-01-01\n").expect("write");
    let request = LoadRequest {
        sssom: Some(write_raw(temp.path())),
        metadata: Some(meta.to_string_lossy().into_owned()),
        mode: Some(PipelineMode::ExpandOnly),
        ..LoadRequest::default()
    };

    let plan = build_load_plan(&Config::default(), request)
        .await
        .expect("plan");

    let options = plan.preprocess.expect("job").options;
    assert_eq!(options.mode, PipelineMode::ExpandOnly);
    assert!(options.external_metadata.is_some());
}

// =============================================================================
// COMMAND RUNS
// =============================================================================

#[tokio::test]
async fn load_sssom_into_redb_then_query() {
    let temp = tempfile::tempdir().expect("temp dir");
    let raw = write_raw(temp.path());
    let db = temp.path().join("oxo.redb");
    let store = format!("redb://{}", db.display());

    let load = parse(&[
        "oxo-loader",
        "--store",
        &store,
        "load",
        "-W",
        "--sssom",
        &raw.to_string_lossy(),
    ]);
    execute(load).await.expect("load");

    let query = parse(&["oxo-loader", "--store", &store, "query", "MONDO:0005015"]);
    execute(query).await.expect("query");

    let session = Session::with_redb(&db).expect("reopen");
    let counts = session.counts().expect("counts");
    assert_eq!(counts.get(&EntityKind::Mapping), Some(&2));
    assert_eq!(counts.get(&EntityKind::Term), Some(&4));
    assert_eq!(counts.get(&EntityKind::Datasource), Some(&2));
    assert!(temp.path().join("mondo.sssom.normalized.tsv").exists());
    assert!(temp.path().join("mondo.sssom.normalized.metadata.yml").exists());
}

#[tokio::test]
async fn wipe_empties_the_store() {
    let temp = tempfile::tempdir().expect("temp dir");
    let raw = write_raw(temp.path());
    let store = format!("redb://{}", temp.path().join("oxo.redb").display());
    let raw_arg = raw.to_string_lossy().into_owned();

    execute(parse(&["oxo-loader", "-S", &store, "load", "--sssom", &raw_arg]))
        .await
        .expect("load");
    execute(parse(&["oxo-loader", "-S", &store, "--json-mode", "wipe"]))
        .await
        .expect("wipe");

    let session = Session::connect(&store).expect("reopen");
    let counts = session.counts().expect("counts");
    assert!(counts.values().all(|count| *count == 0));
}

#[tokio::test]
async fn explicit_missing_config_is_fatal() {
    let cli = parse(&[
        "oxo-loader",
        "-c",
        "/nonexistent/oxo/oxo.toml",
        "--store",
        "memory:",
        "status",
    ]);

    let err = execute(cli).await.expect_err("missing config");

    assert!(matches!(err, OxoError::Configuration(_)));
}

#[tokio::test]
async fn load_with_nothing_to_do_is_rejected() {
    let cli = parse(&["oxo-loader", "--store", "memory:", "load"]);

    let err = execute(cli).await.expect_err("empty plan");

    assert!(matches!(err, OxoError::Configuration(_)));
}
