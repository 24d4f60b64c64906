//! # Graph Upsert Loader
//!
//! Loads a normalized table into a `GraphStore` in three ordered stages:
//!
//! 1. **Datasources**: one per subject and object source prefix
//! 2. **Terms**: one per subject and object curie, then `HAS_SOURCE` links
//! 3. **Mappings**: one edge per row between existing terms
//!
//! Every write is a store merge, so re-running a stage is a no-op. Rows go
//! to the store in chunks of `PERIODIC_COMMIT_ROWS`, one transaction each.

use crate::graph::GraphStore;
use crate::primitives::columns::*;
use crate::primitives::{DEFAULT_SOURCE_TYPE, PERIODIC_COMMIT_ROWS};
use crate::table::{Row, Table};
use crate::{
    Curie, Datasource, DatasourceDescriptor, DatasourceMerge, Mapping, MappingAttributes,
    MergeStats, OxoError, SourceLink, Term, UniqueConstraint,
};
use serde::Serialize;
use std::fmt;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Attributes given to a datasource created without a row descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceDefaults {
    pub source_type: String,
    pub licence: Option<String>,
    pub description: Option<String>,
    pub version_info: Option<String>,
}

impl Default for DatasourceDefaults {
    fn default() -> Self {
        Self {
            source_type: DEFAULT_SOURCE_TYPE.to_string(),
            licence: None,
            description: None,
            version_info: None,
        }
    }
}

impl DatasourceDefaults {
    /// A datasource for `prefix` carrying only the default attributes.
    #[must_use]
    pub fn datasource_for(&self, prefix: &str) -> Datasource {
        Datasource {
            prefix: prefix.to_string(),
            preferred_prefix: Some(prefix.to_string()),
            name: Some(prefix.to_string()),
            description: self.description.clone(),
            version_info: self.version_info.clone(),
            idorg_namespace: Some(prefix.to_lowercase()),
            licence: self.licence.clone(),
            source_type: Some(self.source_type.clone()),
            alternate_prefix: [prefix.to_string(), prefix.to_lowercase()]
                .into_iter()
                .collect(),
        }
    }

    /// A datasource built from a row descriptor, defaults filling the rest.
    #[must_use]
    pub fn datasource_from(&self, prefix: &str, descriptor: DatasourceDescriptor) -> Datasource {
        Datasource {
            prefix: prefix.to_string(),
            preferred_prefix: Some(descriptor.preferred_prefix),
            name: Some(descriptor.name),
            description: self.description.clone(),
            version_info: self.version_info.clone(),
            idorg_namespace: Some(prefix.to_lowercase()),
            licence: self.licence.clone(),
            source_type: Some(descriptor.source_type),
            alternate_prefix: descriptor.alternate_prefix,
        }
    }
}

// =============================================================================
// STAGES
// =============================================================================

/// A load stage. Stages must run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Datasources,
    Terms,
    Mappings,
}

impl Stage {
    pub const ORDER: [Self; 3] = [Self::Datasources, Self::Terms, Self::Mappings];

    /// Header columns the stage reads unconditionally.
    #[must_use]
    pub const fn required_columns(self) -> &'static [&'static str] {
        match self {
            Self::Datasources => &[SUBJECT_SOURCE, OBJECT_SOURCE],
            Self::Terms => &[SUBJECT_ID, OBJECT_ID, SUBJECT_SOURCE, OBJECT_SOURCE],
            Self::Mappings => &[SUBJECT_ID, OBJECT_ID, PREDICATE_ID],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Datasources => "datasources",
            Self::Terms => "terms",
            Self::Mappings => "mappings",
        })
    }
}

/// Result of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub rows: usize,
    pub chunks: usize,
    /// Node or edge merges of the stage itself.
    pub merges: MergeStats,
    /// `HAS_SOURCE` merges; only the terms stage makes these.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_links: Option<MergeStats>,
}

// =============================================================================
// SIDES
// =============================================================================

/// Column names of one endpoint of a row.
struct Side {
    id: &'static str,
    label: &'static str,
    category: &'static str,
    source: &'static str,
    identifier: &'static str,
    uri: &'static str,
}

const SUBJECT: Side = Side {
    id: SUBJECT_ID,
    label: SUBJECT_LABEL,
    category: SUBJECT_CATEGORY,
    source: SUBJECT_SOURCE,
    identifier: SUBJECT_IDENTIFIER,
    uri: SUBJECT_URI,
};

const OBJECT: Side = Side {
    id: OBJECT_ID,
    label: OBJECT_LABEL,
    category: OBJECT_CATEGORY,
    source: OBJECT_SOURCE,
    identifier: OBJECT_IDENTIFIER,
    uri: OBJECT_URI,
};

/// Cell value as written, `None` when absent or blank.
fn cell(row: &Row, column: &str) -> Option<String> {
    row.non_blank(column).map(str::to_string)
}

/// Key cells are passed through even when blank; the store rejects them.
fn key(row: &Row, column: &str) -> String {
    row.get(column).unwrap_or("").trim().to_string()
}

// =============================================================================
// LOADER
// =============================================================================

/// Converts table rows into store merges.
#[derive(Debug, Clone)]
pub struct UpsertLoader {
    defaults: DatasourceDefaults,
    commit_rows: usize,
}

impl Default for UpsertLoader {
    fn default() -> Self {
        Self::new(DatasourceDefaults::default())
    }
}

impl UpsertLoader {
    #[must_use]
    pub fn new(defaults: DatasourceDefaults) -> Self {
        Self {
            defaults,
            commit_rows: PERIODIC_COMMIT_ROWS,
        }
    }

    /// Override the rows-per-transaction chunk size (minimum 1).
    #[must_use]
    pub fn with_commit_rows(mut self, rows: usize) -> Self {
        self.commit_rows = rows.max(1);
        self
    }

    #[must_use]
    pub fn defaults(&self) -> &DatasourceDefaults {
        &self.defaults
    }

    /// Rows per store transaction.
    #[must_use]
    pub fn commit_rows(&self) -> usize {
        self.commit_rows
    }

    /// Create the required uniqueness constraints. Returns how many were new.
    pub fn ensure_constraints<G: GraphStore + ?Sized>(store: &mut G) -> Result<usize, OxoError> {
        let mut created = 0;
        for constraint in UniqueConstraint::REQUIRED {
            if store.ensure_constraint(constraint)? {
                tracing::info!("Created constraint {}", constraint);
                created += 1;
            }
        }
        Ok(created)
    }

    /// Run one stage over `table`.
    pub fn load<G: GraphStore + ?Sized>(
        &self,
        store: &mut G,
        stage: Stage,
        table: &Table,
    ) -> Result<StageReport, OxoError> {
        match stage {
            Stage::Datasources => self.load_datasources(store, table),
            Stage::Terms => self.load_terms(store, table),
            Stage::Mappings => self.load_mappings(store, table),
        }
    }

    /// Stage 1: merge the subject and object datasource of every row.
    pub fn load_datasources<G: GraphStore + ?Sized>(
        &self,
        store: &mut G,
        table: &Table,
    ) -> Result<StageReport, OxoError> {
        self.prepare(store, Stage::Datasources, table)?;
        let (merges, chunks) = self.merge_chunked(table, |rows| {
            let mut batch = Vec::with_capacity(rows.len() * 2);
            for row in rows {
                batch.extend(self.datasource_merges(row)?);
            }
            store.merge_datasources(&batch)
        })?;
        Ok(self.finish(Stage::Datasources, table, chunks, merges, None))
    }

    /// Stage 2: merge both terms of every row, then link them to their sources.
    pub fn load_terms<G: GraphStore + ?Sized>(
        &self,
        store: &mut G,
        table: &Table,
    ) -> Result<StageReport, OxoError> {
        self.prepare(store, Stage::Terms, table)?;
        let (merges, chunks) = self.merge_chunked(table, |rows| {
            let mut batch = Vec::with_capacity(rows.len() * 2);
            for row in rows {
                batch.push(term(row, &SUBJECT));
                batch.push(term(row, &OBJECT));
            }
            store.merge_terms(&batch)
        })?;
        let (links, _) = self.merge_chunked(table, |rows| {
            let batch: Vec<SourceLink> = rows
                .iter()
                .flat_map(|row| [source_link(row, &SUBJECT), source_link(row, &OBJECT)])
                .collect();
            store.merge_source_links(&batch)
        })?;
        if links.unmatched > 0 {
            tracing::warn!(
                "{} source links skipped: term or datasource not loaded",
                links.unmatched
            );
        }
        Ok(self.finish(Stage::Terms, table, chunks, merges, Some(links)))
    }

    /// Stage 3: merge one mapping edge per row between existing terms.
    pub fn load_mappings<G: GraphStore + ?Sized>(
        &self,
        store: &mut G,
        table: &Table,
    ) -> Result<StageReport, OxoError> {
        self.prepare(store, Stage::Mappings, table)?;
        let (merges, chunks) = self.merge_chunked(table, |rows| {
            let batch: Vec<Mapping> = rows.iter().map(mapping).collect();
            store.merge_mappings(&batch)
        })?;
        if merges.unmatched > 0 {
            tracing::warn!(
                "{} mapping rows skipped: subject or object term not loaded",
                merges.unmatched
            );
        }
        Ok(self.finish(Stage::Mappings, table, chunks, merges, None))
    }

    fn prepare<G: GraphStore + ?Sized>(
        &self,
        store: &mut G,
        stage: Stage,
        table: &Table,
    ) -> Result<(), OxoError> {
        table.require_columns(stage.required_columns())?;
        Self::ensure_constraints(store)?;
        tracing::info!("Loading {} from {} rows", stage, table.len());
        Ok(())
    }

    fn merge_chunked(
        &self,
        table: &Table,
        mut merge: impl FnMut(&[Row]) -> Result<MergeStats, OxoError>,
    ) -> Result<(MergeStats, usize), OxoError> {
        let mut total = MergeStats::default();
        let mut chunks = 0;
        for chunk in table.rows().chunks(self.commit_rows) {
            let stats = merge(chunk)?;
            chunks += 1;
            tracing::debug!("Committed chunk {} ({} rows): {}", chunks, chunk.len(), stats);
            total += stats;
        }
        Ok((total, chunks))
    }

    fn finish(
        &self,
        stage: Stage,
        table: &Table,
        chunks: usize,
        merges: MergeStats,
        source_links: Option<MergeStats>,
    ) -> StageReport {
        match source_links {
            Some(links) => tracing::info!("Loaded {}: {}; source links: {}", stage, merges, links),
            None => tracing::info!("Loaded {}: {}", stage, merges),
        }
        StageReport {
            stage,
            rows: table.len(),
            chunks,
            merges,
            source_links,
        }
    }

    // =========================================================================
    // ROW CONVERSION
    // =========================================================================

    fn datasource_merges(&self, row: &Row) -> Result<[DatasourceMerge; 2], OxoError> {
        let subject_prefix = key(row, SUBJECT.source);
        let object_prefix = key(row, OBJECT.source);

        let subject = match row.non_blank(DATASOURCE) {
            Some(json) => {
                let descriptor = DatasourceDescriptor::from_json(json).map_err(|e| {
                    OxoError::MalformedRow {
                        line: row.line(),
                        reason: format!("{} column: {}", DATASOURCE, e),
                    }
                })?;
                DatasourceMerge {
                    datasource: self.defaults.datasource_from(&subject_prefix, descriptor),
                    overwrite: true,
                }
            }
            None => DatasourceMerge {
                datasource: self.defaults.datasource_for(&subject_prefix),
                overwrite: false,
            },
        };
        let object = DatasourceMerge {
            datasource: self.defaults.datasource_for(&object_prefix),
            overwrite: false,
        };
        Ok([subject, object])
    }
}

fn term(row: &Row, side: &Side) -> Term {
    let curie = key(row, side.id);
    let identifier = cell(row, side.identifier)
        .or_else(|| Curie::parse(&curie).map(|c| c.local().to_string()));
    Term {
        label: cell(row, side.label),
        category: cell(row, side.category),
        identifier,
        uri: cell(row, side.uri),
        curie,
    }
}

fn source_link(row: &Row, side: &Side) -> SourceLink {
    SourceLink::new(key(row, side.id), key(row, side.source))
}

fn mapping(row: &Row) -> Mapping {
    Mapping {
        subject: key(row, SUBJECT_ID),
        object: key(row, OBJECT_ID),
        attributes: MappingAttributes {
            predicate: cell(row, PREDICATE_ID),
            match_type: cell(row, MATCH_TYPE),
            mapping_tool: cell(row, MAPPING_TOOL),
            confidence: cell(row, CONFIDENCE),
            match_category: cell(row, MATCH_CATEGORY),
            scope: cell(row, SCOPE),
            source_prefix: cell(row, SUBJECT_SOURCE),
            datasource: cell(row, DATASOURCE),
            date: cell(row, MAPPING_DATE),
        },
        match_string: cell(row, MATCH_STRING),
    }
}

// =============================================================================
// TESTS
// =============================================================================
