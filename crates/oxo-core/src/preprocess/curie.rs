//! # Curie Expander
//!
//! Resolves `subject_id` / `object_id` curies into `subject_uri` /
//! `object_uri` using the metadata's prefix → namespace map.

use super::RowTransform;
use crate::primitives::columns::{OBJECT_ID, OBJECT_URI, SUBJECT_ID, SUBJECT_URI};
use crate::table::Row;
use crate::{Curie, OxoError};
use std::collections::BTreeMap;

/// Parse the curie in `column`, failing with the row's line number.
pub(crate) fn row_curie(row: &Row, column: &str) -> Result<Curie, OxoError> {
    let raw = row.get(column).unwrap_or("");
    Curie::parse(raw).ok_or_else(|| OxoError::MalformedRow {
        line: row.line(),
        reason: format!("{} '{}' is not a prefix:local curie", column, raw),
    })
}

/// Row transform that expands both endpoint curies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurieExpander {
    namespaces: BTreeMap<String, String>,
}

impl CurieExpander {
    #[must_use]
    pub fn new(namespaces: BTreeMap<String, String>) -> Self {
        Self { namespaces }
    }

    /// Namespace + local part, if the prefix is mapped.
    #[must_use]
    pub fn expand(&self, curie: &Curie) -> Option<String> {
        self.namespaces
            .get(curie.prefix())
            .map(|namespace| format!("{}{}", namespace, curie.local()))
    }
}

impl RowTransform for CurieExpander {
    fn name(&self) -> &'static str {
        "curie expansion"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[SUBJECT_ID, OBJECT_ID]
    }

    fn output_columns(&self) -> &'static [&'static str] {
        &[SUBJECT_URI, OBJECT_URI]
    }

    fn apply(&self, mut row: Row) -> Result<Row, OxoError> {
        for (id_column, uri_column) in [(SUBJECT_ID, SUBJECT_URI), (OBJECT_ID, OBJECT_URI)] {
            let curie = row_curie(&row, id_column)?;
            if let Some(uri) = self.expand(&curie) {
                row.set(uri_column, uri);
            }
        }
        Ok(row)
    }
}
