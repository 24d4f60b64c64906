//! # oxo-core
//!
//! The ingestion engine of the OxO cross-reference graph.
//!
//! This crate loads ontology terms, their source registries and the
//! mappings between them into a graph store, and prepares raw mapping
//! tables for loading.
//!
//! ## Layout
//!
//! - `graph` / `storage` → the `GraphStore` boundary and its backends
//! - `preprocess` / `table` → tabular normalization
//! - `wipe` / `loader` → bulk deletion and merge-upsert stages
//! - `orchestrator` → wipe → preprocess → load sequencing
//! - `search` → read-side mapping lookup
//!
//! ## Architectural Constraints
//!
//! - Every store write is a merge; re-running any operation is safe
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod graph;
pub mod loader;
pub mod orchestrator;
pub mod preprocess;
pub mod primitives;
pub mod search;
pub mod session;
pub mod storage;
pub mod table;
pub mod types;
pub mod wipe;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Curie, Datasource, DatasourceDescriptor, DatasourceMerge, EntityKind, Mapping,
    MappingAttributes, MappingKey, MergeStats, OxoError, Scope, SourceLink, Term,
    UniqueConstraint,
};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use graph::{Graph, GraphStore};
pub use session::{Session, StorageBackend, StoreLocator};
pub use storage::RedbGraph;

// =============================================================================
// RE-EXPORTS: Ingestion
// =============================================================================

pub use loader::{DatasourceDefaults, Stage, StageReport, UpsertLoader};
pub use orchestrator::{IngestPlan, IngestReport, Orchestrator, PreprocessJob};
pub use preprocess::{
    PipelineMode, PreprocessOptions, PreprocessReport, Preprocessed, preprocess_file,
    preprocess_str,
};
pub use search::{MappingResponse, search_mappings};
pub use table::{Row, Table};
pub use wipe::{BatchLimits, WipeController, WipeReport};
