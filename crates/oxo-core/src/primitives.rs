//! # Fixed Primitives
//!
//! Compiled-in constants of the ingestion engine: batch ceilings, commit
//! sizes, tabular column names, the metadata comment marker and the scope
//! classification table.

use crate::Scope;

// =============================================================================
// BULK DELETION
// =============================================================================

/// Maximum relationships (mappings, source links) deleted per batch.
pub const RELATIONSHIP_BATCH_LIMIT: usize = 50_000;

/// Maximum `Term` nodes deleted per batch.
pub const TERM_BATCH_LIMIT: usize = 50_000;

/// Maximum `Datasource` nodes deleted per batch.
pub const DATASOURCE_BATCH_LIMIT: usize = 1_000;

// =============================================================================
// LOADING
// =============================================================================

/// Rows submitted to the store per transaction during a load stage.
pub const PERIODIC_COMMIT_ROWS: usize = 10_000;

/// Source type given to datasources when nothing else is known.
pub const DEFAULT_SOURCE_TYPE: &str = "ONTOLOGY";

// =============================================================================
// PREPROCESSING
// =============================================================================

/// Marker that prefixes every embedded metadata line.
pub const METADATA_COMMENT: char = '#';

/// Mapping date used when the metadata carries none.
pub const SENTINEL_MAPPING_DATE: &str = "1970-01-01";

/// Format of `mapping_date` values.
pub const MAPPING_DATE_FORMAT: &str = "%Y-%m-%d";

/// Metadata key holding the prefix → namespace map.
pub const CURIE_MAP_KEY: &str = "curie_map";

/// Metadata key holding the mapping date.
pub const MAPPING_DATE_KEY: &str = "mapping_date";

/// Predicates with a fixed scope. Any other predicate stays unclassified.
pub const SCOPE_TABLE: &[(&str, Scope)] = &[("owl:equivalentClass", Scope::Exact)];

/// Look up the scope of a predicate in [`SCOPE_TABLE`].
#[must_use]
pub fn scope_for_predicate(predicate: &str) -> Option<Scope> {
    SCOPE_TABLE
        .iter()
        .find(|(p, _)| *p == predicate.trim())
        .map(|(_, scope)| *scope)
}

// =============================================================================
// MAPPING SEARCH
// =============================================================================

/// Hard upper bound on mapping search distance.
pub const MAX_SEARCH_DISTANCE: usize = 3;

// =============================================================================
// COLUMN NAMES
// =============================================================================

/// Tabular column names shared by the preprocessing pipeline and the loader.
pub mod columns {
    pub const SUBJECT_ID: &str = "subject_id";
    pub const SUBJECT_LABEL: &str = "subject_label";
    pub const SUBJECT_CATEGORY: &str = "subject_category";
    pub const SUBJECT_SOURCE: &str = "subject_source";
    pub const SUBJECT_IDENTIFIER: &str = "subject_identifier";
    pub const SUBJECT_URI: &str = "subject_uri";

    pub const OBJECT_ID: &str = "object_id";
    pub const OBJECT_LABEL: &str = "object_label";
    pub const OBJECT_CATEGORY: &str = "object_category";
    pub const OBJECT_SOURCE: &str = "object_source";
    pub const OBJECT_IDENTIFIER: &str = "object_identifier";
    pub const OBJECT_URI: &str = "object_uri";

    pub const PREDICATE_ID: &str = "predicate_id";
    pub const MATCH_TYPE: &str = "match_type";
    pub const MAPPING_TOOL: &str = "mapping_tool";
    pub const CONFIDENCE: &str = "confidence";
    pub const MATCH_CATEGORY: &str = "match_category";
    pub const MATCH_STRING: &str = "match_string";

    pub const DATASOURCE: &str = "datasource";
    pub const SCOPE: &str = "scope";
    pub const MAPPING_DATE: &str = "mapping_date";
}
