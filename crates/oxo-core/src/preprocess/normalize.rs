//! # Row Normalizer
//!
//! Independent per-row derivations of the legacy pipeline. Each one reads
//! only the row it is given, so they compose in any order.

use super::RowTransform;
use super::curie::row_curie;
use crate::primitives::columns::{
    DATASOURCE, MAPPING_DATE, OBJECT_ID, OBJECT_IDENTIFIER, PREDICATE_ID, SCOPE, SUBJECT_ID,
    SUBJECT_IDENTIFIER, SUBJECT_SOURCE,
};
use crate::primitives::scope_for_predicate;
use crate::table::Row;
use crate::{DatasourceDescriptor, OxoError};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Writes the local part of each endpoint curie.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierExtractor;

impl RowTransform for IdentifierExtractor {
    fn name(&self) -> &'static str {
        "identifier extraction"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[SUBJECT_ID, OBJECT_ID]
    }

    fn output_columns(&self) -> &'static [&'static str] {
        &[SUBJECT_IDENTIFIER, OBJECT_IDENTIFIER]
    }

    fn apply(&self, mut row: Row) -> Result<Row, OxoError> {
        for (id_column, identifier_column) in
            [(SUBJECT_ID, SUBJECT_IDENTIFIER), (OBJECT_ID, OBJECT_IDENTIFIER)]
        {
            let curie = row_curie(&row, id_column)?;
            row.set(identifier_column, curie.local());
        }
        Ok(row)
    }
}

// =============================================================================
// DATASOURCE DESCRIPTOR
// =============================================================================

/// Serializes a datasource descriptor for the row's `subject_source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceSynthesizer {
    source_type: String,
}

impl DatasourceSynthesizer {
    #[must_use]
    pub fn new(source_type: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
        }
    }
}

impl RowTransform for DatasourceSynthesizer {
    fn name(&self) -> &'static str {
        "datasource synthesis"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[SUBJECT_SOURCE]
    }

    fn output_columns(&self) -> &'static [&'static str] {
        &[DATASOURCE]
    }

    fn apply(&self, mut row: Row) -> Result<Row, OxoError> {
        let prefix = row
            .non_blank(SUBJECT_SOURCE)
            .map(str::trim)
            .ok_or_else(|| OxoError::MalformedRow {
                line: row.line(),
                reason: format!("{} is blank", SUBJECT_SOURCE),
            })?;
        let json = DatasourceDescriptor::for_source(prefix, &self.source_type).to_json()?;
        row.set(DATASOURCE, json);
        Ok(row)
    }
}

// =============================================================================
// MAPPING DATE
// =============================================================================

/// Stamps every row with one mapping date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingDateStamp {
    date: String,
}

impl MappingDateStamp {
    #[must_use]
    pub fn new(date: impl Into<String>) -> Self {
        Self { date: date.into() }
    }
}

impl RowTransform for MappingDateStamp {
    fn name(&self) -> &'static str {
        "mapping date"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[]
    }

    fn output_columns(&self) -> &'static [&'static str] {
        &[MAPPING_DATE]
    }

    fn apply(&self, mut row: Row) -> Result<Row, OxoError> {
        row.set(MAPPING_DATE, self.date.as_str());
        Ok(row)
    }
}

// =============================================================================
// SCOPE
// =============================================================================

/// Classifies the mapping scope from `predicate_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeClassifier;

impl RowTransform for ScopeClassifier {
    fn name(&self) -> &'static str {
        "scope classification"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[PREDICATE_ID]
    }

    fn output_columns(&self) -> &'static [&'static str] {
        &[SCOPE]
    }

    fn apply(&self, mut row: Row) -> Result<Row, OxoError> {
        if let Some(scope) = row.get(PREDICATE_ID).and_then(scope_for_predicate) {
            row.set(SCOPE, scope.as_str());
        }
        Ok(row)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new(2)
            .with(SUBJECT_ID, "MONDO:0005015")
            .with(OBJECT_ID, "DOID:9351")
            .with(SUBJECT_SOURCE, "MONDO")
            .with(PREDICATE_ID, "owl:equivalentClass")
    }

    #[test]
    fn identifiers_are_local_parts() {
        let row = IdentifierExtractor.apply(row()).expect("apply");

        assert_eq!(row.get(SUBJECT_IDENTIFIER), Some("0005015"));
        assert_eq!(row.get(OBJECT_IDENTIFIER), Some("9351"));
    }

    #[test]
    fn datasource_descriptor_is_json() {
        let row = DatasourceSynthesizer::new("ONTOLOGY")
            .apply(row())
            .expect("apply");

        let descriptor =
            DatasourceDescriptor::from_json(row.get(DATASOURCE).expect("datasource"))
                .expect("json");
        assert_eq!(descriptor.prefix, "MONDO");
        assert_eq!(descriptor.source_type, "ONTOLOGY");
        assert!(descriptor.alternate_prefix.contains("mondo"));
    }

    #[test]
    fn blank_subject_source_is_malformed() {
        let row = row().with(SUBJECT_SOURCE, " ");

        let err = DatasourceSynthesizer::new("ONTOLOGY")
            .apply(row)
            .expect_err("blank");

        assert!(matches!(err, OxoError::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn date_stamp_overwrites() {
        let row = row().with(MAPPING_DATE, "2001-01-01");
        let row = MappingDateStamp::new("2022-01-01").apply(row).expect("apply");

        assert_eq!(row.get(MAPPING_DATE), Some("2022-01-01"));
    }

    #[test]
    fn scope_is_set_for_equivalent_class_only() {
        let exact = ScopeClassifier.apply(row()).expect("apply");
        assert_eq!(exact.get(SCOPE), Some("EXACT"));

        let other = ScopeClassifier
            .apply(row().with(PREDICATE_ID, "skos:closeMatch"))
            .expect("apply");
        assert_eq!(other.get(SCOPE), None);
    }
}
