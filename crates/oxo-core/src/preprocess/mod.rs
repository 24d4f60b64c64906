//! # Preprocessing Pipeline
//!
//! Turns a raw mapping table (embedded metadata header + flat rows) into the
//! canonical table the loader consumes, plus a standalone YAML sidecar of the
//! metadata.
//!
//! Two explicit modes:
//! - `legacy`: curie expansion, identifiers, datasource descriptor, mapping
//!   date and scope
//! - `expand-only`: curie expansion alone, every other column untouched
//!
//! New columns are appended after the original ones in pipeline order.
//! The pipeline never touches a store.

pub mod curie;
pub mod metadata;
pub mod normalize;

use crate::OxoError;
use crate::primitives::{DEFAULT_SOURCE_TYPE, MAPPING_DATE_FORMAT, SENTINEL_MAPPING_DATE};
use crate::table::{Row, Table};
use curie::CurieExpander;
use metadata::{Metadata, extract};
use normalize::{DatasourceSynthesizer, IdentifierExtractor, MappingDateStamp, ScopeClassifier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// =============================================================================
// ROW TRANSFORM
// =============================================================================

/// A pure per-row derivation.
pub trait RowTransform {
    /// Human-readable name, used in logs.
    fn name(&self) -> &'static str;

    /// Columns that must be in the header before the transform runs.
    fn required_columns(&self) -> &'static [&'static str];

    /// Columns the transform writes, in output order.
    fn output_columns(&self) -> &'static [&'static str];

    /// Derive the new fields of one row.
    fn apply(&self, row: Row) -> Result<Row, OxoError>;
}

// =============================================================================
// MODE
// =============================================================================

/// Which set of transforms to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    #[default]
    Legacy,
    ExpandOnly,
}

impl PipelineMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::ExpandOnly => "expand-only",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineMode {
    type Err = OxoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "legacy" => Ok(Self::Legacy),
            "expand-only" => Ok(Self::ExpandOnly),
            other => Err(OxoError::Configuration(format!(
                "unknown preprocess mode '{}' (expected legacy or expand-only)",
                other
            ))),
        }
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// An ordered list of row transforms.
pub struct Pipeline {
    transforms: Vec<Box<dyn RowTransform>>,
}

impl Pipeline {
    /// Build the pipeline of `mode` from the resolved metadata.
    pub fn for_mode(
        mode: PipelineMode,
        metadata: &Metadata,
        source_type: &str,
    ) -> Result<Self, OxoError> {
        let mut transforms: Vec<Box<dyn RowTransform>> =
            vec![Box::new(CurieExpander::new(metadata.curie_map()?))];

        if mode == PipelineMode::Legacy {
            let date = metadata
                .mapping_date()?
                .map(|d| d.format(MAPPING_DATE_FORMAT).to_string())
                .unwrap_or_else(|| SENTINEL_MAPPING_DATE.to_string());

            transforms.push(Box::new(IdentifierExtractor));
            transforms.push(Box::new(DatasourceSynthesizer::new(source_type)));
            transforms.push(Box::new(MappingDateStamp::new(date)));
            transforms.push(Box::new(ScopeClassifier));
        }

        Ok(Self { transforms })
    }

    /// Names of the transforms, in application order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.transforms.iter().map(|t| t.name())
    }

    /// Run every transform over every row of `table`.
    pub fn run(&self, mut table: Table) -> Result<Table, OxoError> {
        for transform in &self.transforms {
            table.require_columns(transform.required_columns())?;
        }
        for transform in &self.transforms {
            for column in transform.output_columns() {
                table.ensure_column(column);
            }
        }
        table.map_rows(|row| {
            self.transforms
                .iter()
                .try_fold(row, |row, transform| transform.apply(row))
        })
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Options of one preprocessing run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessOptions {
    pub mode: PipelineMode,
    /// `sourceType` written into synthesized datasource descriptors.
    pub source_type: String,
    /// Metadata merged over the embedded header, key by key.
    pub external_metadata: Option<Metadata>,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            mode: PipelineMode::default(),
            source_type: DEFAULT_SOURCE_TYPE.to_string(),
            external_metadata: None,
        }
    }
}

/// Output of the pipeline before it is written anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    pub table: Table,
    pub metadata: Metadata,
}

/// Preprocess the full text of a mapping file.
pub fn preprocess_str(text: &str, options: &PreprocessOptions) -> Result<Preprocessed, OxoError> {
    let extracted = extract(text)?;
    let mut metadata = extracted.metadata;
    if let Some(external) = &options.external_metadata {
        metadata.merge(external.clone());
    }

    let table = Table::from_tsv(extracted.body, extracted.header_lines + 1)?;
    let pipeline = Pipeline::for_mode(options.mode, &metadata, &options.source_type)?;
    tracing::debug!("Preprocessing {} rows with {:?}", table.len(), pipeline);

    Ok(Preprocessed {
        table: pipeline.run(table)?,
        metadata,
    })
}

/// Summary of a preprocessing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreprocessReport {
    pub mode: PipelineMode,
    pub rows: usize,
    pub output: PathBuf,
    pub metadata_path: PathBuf,
}

/// Default sidecar path: `<output stem>.metadata.yml` next to the output.
#[must_use]
pub fn default_metadata_path(output: &Path) -> PathBuf {
    output.with_extension("metadata.yml")
}

/// Preprocess `input` into `output` and the YAML sidecar at `metadata_out`.
pub fn preprocess_file(
    input: &Path,
    output: &Path,
    metadata_out: Option<&Path>,
    options: &PreprocessOptions,
) -> Result<PreprocessReport, OxoError> {
    let text = std::fs::read_to_string(input)
        .map_err(|e| OxoError::IoError(format!("read {}: {}", input.display(), e)))?;

    let Preprocessed { table, metadata } = preprocess_str(&text, options)?;

    let metadata_path = metadata_out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_metadata_path(output));
    table.write_tsv(output)?;
    metadata.write_file(&metadata_path)?;

    tracing::info!(
        "Preprocessed {} rows ({}) into {}",
        table.len(),
        options.mode,
        output.display()
    );

    Ok(PreprocessReport {
        mode: options.mode,
        rows: table.len(),
        output: output.to_path_buf(),
        metadata_path,
    })
}

// =============================================================================
// TESTS
// =============================================================================
