//! # Ingestion Orchestrator
//!
//! Sequences one invocation: constraints, wipe, preprocess, then the three
//! load stages. Steps that were not requested are skipped.

use crate::graph::GraphStore;
use crate::loader::{Stage, StageReport, UpsertLoader};
use crate::preprocess::{PreprocessOptions, PreprocessReport, preprocess_file};
use crate::table::Table;
use crate::wipe::{WipeController, WipeReport};
use crate::OxoError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A preprocessing step.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Sidecar path; defaults to `<output>.metadata.yml`.
    pub metadata_out: Option<PathBuf>,
    pub options: PreprocessOptions,
}

/// The operations requested for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestPlan {
    pub wipe: bool,
    pub preprocess: Option<PreprocessJob>,
    pub datasources: Option<PathBuf>,
    pub terms: Option<PathBuf>,
    pub mappings: Option<PathBuf>,
}

impl IngestPlan {
    /// Source table of `stage`, if that stage was requested.
    #[must_use]
    pub fn input_for(&self, stage: Stage) -> Option<&Path> {
        match stage {
            Stage::Datasources => self.datasources.as_deref(),
            Stage::Terms => self.terms.as_deref(),
            Stage::Mappings => self.mappings.as_deref(),
        }
    }

    /// Whether any requested step touches the store.
    #[must_use]
    pub fn needs_store(&self) -> bool {
        self.wipe || Stage::ORDER.iter().any(|s| self.input_for(*s).is_some())
    }

    /// Whether nothing at all was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.needs_store() && self.preprocess.is_none()
    }
}

/// What an invocation did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub constraints_created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wipe: Option<WipeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocess: Option<PreprocessReport>,
    pub stages: Vec<StageReport>,
}

/// The composition root of the ingestion engine.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    loader: UpsertLoader,
    wiper: WipeController,
}

impl Orchestrator {
    /// Replace the loader, e.g. to change datasource defaults or chunk size.
    #[must_use]
    pub fn with_loader(mut self, loader: UpsertLoader) -> Self {
        self.loader = loader;
        self
    }

    #[must_use]
    pub fn with_wipe_controller(mut self, wiper: WipeController) -> Self {
        self.wiper = wiper;
        self
    }

    /// Execute `plan`.
    ///
    /// `store` may be `None` only when the plan never touches the store.
    pub fn run(
        &self,
        plan: &IngestPlan,
        mut store: Option<&mut dyn GraphStore>,
    ) -> Result<IngestReport, OxoError> {
        if plan.needs_store() && store.is_none() {
            return Err(OxoError::Configuration(
                "no store configured for wipe or load".to_string(),
            ));
        }

        let mut report = IngestReport::default();

        if let Some(store) = store.as_deref_mut() {
            report.constraints_created = UpsertLoader::ensure_constraints(store)?;
        }

        if plan.wipe {
            if let Some(store) = store.as_deref_mut() {
                tracing::info!("Wiping store");
                report.wipe = Some(self.wiper.wipe(store)?);
            }
        }

        if let Some(job) = &plan.preprocess {
            tracing::info!("Preprocessing {}", job.input.display());
            report.preprocess = Some(preprocess_file(
                &job.input,
                &job.output,
                job.metadata_out.as_deref(),
                &job.options,
            )?);
        }

        let mut tables: BTreeMap<PathBuf, Table> = BTreeMap::new();
        for stage in Stage::ORDER {
            let (Some(path), Some(store)) = (plan.input_for(stage), store.as_deref_mut()) else {
                continue;
            };
            if !tables.contains_key(path) {
                tables.insert(path.to_path_buf(), Table::read_tsv(path)?);
            }
            let Some(table) = tables.get(path) else {
                continue;
            };
            report.stages.push(self.loader.load(store, stage, table)?);
        }

        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================
