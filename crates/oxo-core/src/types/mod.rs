//! # Core Type Definitions
//!
//! This module contains the data model of the cross-reference graph:
//! - Identifiers (`Curie`) and their classification (`Scope`)
//! - Graph entities (`Term`, `Datasource`, `SourceLink`, `Mapping`)
//! - Merge requests and results (`DatasourceMerge`, `MergeStats`)
//! - Store schema (`EntityKind`, `UniqueConstraint`)
//! - Error types (`OxoError`)
//!
//! ## Ordering Guarantees
//!
//! Every key type implements `Ord` so stores can keep entities in
//! `BTreeMap`/`BTreeSet` and visit them in a stable order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::AddAssign;
use thiserror::Error;

// =============================================================================
// CURIE
// =============================================================================

/// A compact identifier of the form `prefix:local`.
///
/// Only the first colon separates prefix from local part, so
/// `obo:GO:0008150` has prefix `obo` and local part `GO:0008150`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Curie {
    prefix: String,
    local: String,
}

impl Curie {
    /// Parse a curie. Returns `None` if there is no colon or the prefix is empty.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, local) = raw.trim().split_once(':')?;
        if prefix.is_empty() {
            return None;
        }
        Some(Self {
            prefix: prefix.to_string(),
            local: local.to_string(),
        })
    }

    /// The namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The local part (everything after the first colon).
    #[must_use]
    pub fn local(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for Curie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local)
    }
}

// =============================================================================
// SCOPE
// =============================================================================

/// Semantic scope of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    Exact,
    Narrower,
    Broader,
    Related,
}

impl Scope {
    /// The upper-case wire name stored on mapping edges.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "EXACT",
            Self::Narrower => "NARROWER",
            Self::Broader => "BROADER",
            Self::Related => "RELATED",
        }
    }

    /// Parse a wire name (case-insensitive).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "EXACT" => Some(Self::Exact),
            "NARROWER" => Some(Self::Narrower),
            "BROADER" => Some(Self::Broader),
            "RELATED" => Some(Self::Related),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// STORE SCHEMA
// =============================================================================

/// The kinds of graph element the bulk deletion controller works through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// `MAPPING` edges between terms.
    Mapping,
    /// `HAS_SOURCE` edges from a term to its datasource.
    SourceLink,
    /// `Term` nodes.
    Term,
    /// `Datasource` nodes.
    Datasource,
}

impl EntityKind {
    /// Reverse dependency order: every kind is only deleted once nothing
    /// that references it is left.
    pub const WIPE_ORDER: [Self; 4] = [Self::Mapping, Self::SourceLink, Self::Term, Self::Datasource];

    /// Whether this kind is a relationship rather than a node.
    #[must_use]
    pub const fn is_relationship(self) -> bool {
        matches!(self, Self::Mapping | Self::SourceLink)
    }

    /// Human-readable plural name, used in logs and status output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mapping => "mappings",
            Self::SourceLink => "source links",
            Self::Term => "terms",
            Self::Datasource => "datasources",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named uniqueness constraint over one label/property pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniqueConstraint {
    pub label: &'static str,
    pub property: &'static str,
}

impl UniqueConstraint {
    /// `Term.curie` is unique.
    pub const TERM_CURIE: Self = Self {
        label: "Term",
        property: "curie",
    };

    /// `Datasource.prefix` is unique.
    pub const DATASOURCE_PREFIX: Self = Self {
        label: "Datasource",
        property: "prefix",
    };

    /// Every constraint the loader requires before any stage runs.
    pub const REQUIRED: [Self; 2] = [Self::TERM_CURIE, Self::DATASOURCE_PREFIX];

    /// The stable name, e.g. `Term.curie`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}.{}", self.label, self.property)
    }

    /// Resolve a stable name back to one of the known constraints.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::REQUIRED.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.label, self.property)
    }
}

// =============================================================================
// TERM
// =============================================================================

/// A `Term` node, keyed by its curie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub curie: String,
    pub label: Option<String>,
    pub category: Option<String>,
    pub identifier: Option<String>,
    pub uri: Option<String>,
}

impl Term {
    /// A term with only its key set.
    #[must_use]
    pub fn new(curie: impl Into<String>) -> Self {
        Self {
            curie: curie.into(),
            label: None,
            category: None,
            identifier: None,
            uri: None,
        }
    }
}

// =============================================================================
// DATASOURCE
// =============================================================================

/// A `Datasource` node, keyed by its prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datasource {
    pub prefix: String,
    pub preferred_prefix: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub version_info: Option<String>,
    pub idorg_namespace: Option<String>,
    pub licence: Option<String>,
    pub source_type: Option<String>,
    pub alternate_prefix: BTreeSet<String>,
}

/// Per-row datasource descriptor, serialized as JSON into the `datasource`
/// column by the row normalizer and read back by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceDescriptor {
    pub prefix: String,
    pub name: String,
    pub source_type: String,
    #[serde(default)]
    pub alternate_prefix: BTreeSet<String>,
    pub preferred_prefix: String,
}

impl DatasourceDescriptor {
    /// Build the descriptor for a source prefix.
    ///
    /// The alternate prefix set always holds the prefix itself and its
    /// lower-cased form.
    #[must_use]
    pub fn for_source(prefix: &str, source_type: &str) -> Self {
        let alternate_prefix = [prefix.to_string(), prefix.to_lowercase()]
            .into_iter()
            .collect();
        Self {
            prefix: prefix.to_string(),
            name: prefix.to_string(),
            source_type: source_type.to_string(),
            alternate_prefix,
            preferred_prefix: prefix.to_string(),
        }
    }

    /// Serialize to the compact JSON stored in the `datasource` column.
    pub fn to_json(&self) -> Result<String, OxoError> {
        serde_json::to_string(self).map_err(|e| OxoError::SerializationError(e.to_string()))
    }

    /// Parse the JSON stored in the `datasource` column.
    pub fn from_json(raw: &str) -> Result<Self, OxoError> {
        serde_json::from_str(raw).map_err(|e| {
            OxoError::SerializationError(format!("not a datasource descriptor: {e}"))
        })
    }
}

/// A datasource merge request.
///
/// With `overwrite` set, an existing node takes every attribute of
/// `datasource`. Without it, the attributes only apply when the node is
/// created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceMerge {
    pub datasource: Datasource,
    pub overwrite: bool,
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

/// A `HAS_SOURCE` edge from a term to its datasource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLink {
    pub curie: String,
    pub prefix: String,
}

impl SourceLink {
    #[must_use]
    pub fn new(curie: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            curie: curie.into(),
            prefix: prefix.into(),
        }
    }
}

/// The attribute tuple that, together with both endpoints, keys a mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MappingAttributes {
    pub predicate: Option<String>,
    pub match_type: Option<String>,
    pub mapping_tool: Option<String>,
    pub confidence: Option<String>,
    pub match_category: Option<String>,
    pub scope: Option<String>,
    pub source_prefix: Option<String>,
    pub datasource: Option<String>,
    pub date: Option<String>,
}

/// Full merge key of a `MAPPING` edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MappingKey {
    pub subject: String,
    pub object: String,
    pub attributes: MappingAttributes,
}

/// A `MAPPING` edge. `match_string` is set on merge, it is not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub subject: String,
    pub object: String,
    pub attributes: MappingAttributes,
    pub match_string: Option<String>,
}

impl Mapping {
    /// The merge key of this mapping.
    #[must_use]
    pub fn key(&self) -> MappingKey {
        MappingKey {
            subject: self.subject.clone(),
            object: self.object.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// The classified scope, if the stored value names one.
    #[must_use]
    pub fn scope(&self) -> Option<Scope> {
        self.attributes.scope.as_deref().and_then(Scope::parse)
    }
}

// =============================================================================
// MERGE STATISTICS
// =============================================================================

/// Summary of a batch of merges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Entities that did not exist and were created.
    pub created: usize,
    /// Entities that already existed and were matched by key.
    pub matched: usize,
    /// Requests dropped because an endpoint to match on was absent.
    pub unmatched: usize,
}

impl MergeStats {
    /// Total number of merge requests accounted for.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.created + self.matched + self.unmatched
    }
}

impl AddAssign for MergeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.matched += rhs.matched;
        self.unmatched += rhs.unmatched;
    }
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} matched={} unmatched={}",
            self.created, self.matched, self.unmatched
        )
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while preprocessing, loading or wiping.
///
/// - No silent failures: malformed input is reported, never skipped
/// - Use `Result<T, OxoError>` for fallible operations
#[derive(Debug, Error)]
pub enum OxoError {
    /// Configuration is missing or invalid (e.g. no store endpoint).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store (or a remote resource) could not be reached or opened.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A merge would break a uniqueness constraint (e.g. a null key).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A tabular row cannot be processed.
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    /// A required column is absent from the header.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// The embedded or external metadata document is invalid.
    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
