//! # Metadata Extractor
//!
//! Mapping tables may open with a block of `#`-prefixed lines holding a
//! YAML document (`curie_map`, `mapping_date`, ...). This module splits that
//! block from the tabular body and gives typed access to the keys the
//! pipeline understands.

use crate::OxoError;
use crate::primitives::{CURIE_MAP_KEY, MAPPING_DATE_FORMAT, MAPPING_DATE_KEY, METADATA_COMMENT};
use chrono::NaiveDate;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// FRONT MATTER
// =============================================================================

/// The leading comment block of a file, split from its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter<'a> {
    /// Comment lines with the marker stripped, newline-joined.
    pub header: String,
    /// Everything from the first non-comment line on.
    pub body: &'a str,
    /// Number of comment lines consumed.
    pub lines: usize,
}

/// Split the consecutive leading comment lines off `text`.
///
/// Stops at the first line not starting with the comment marker. Nothing
/// after that point is inspected, so a `#` deeper in the body stays data.
#[must_use]
pub fn split_front_matter(text: &str) -> FrontMatter<'_> {
    let mut header = String::new();
    let mut consumed = 0;
    let mut lines = 0;

    for line in text.split_inclusive('\n') {
        let Some(stripped) = line.strip_prefix(METADATA_COMMENT) else {
            break;
        };
        header.push_str(stripped.trim_end_matches(['\n', '\r']));
        header.push('\n');
        consumed += line.len();
        lines += 1;
    }

    FrontMatter {
        header,
        body: &text[consumed..],
        lines,
    }
}

// =============================================================================
// METADATA
// =============================================================================

/// A parsed metadata document. Always a mapping at the top level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(Mapping);

impl Metadata {
    /// Parse a YAML document. Blank or `null` documents give empty metadata.
    pub fn parse_yaml(text: &str) -> Result<Self, OxoError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_str(text)
            .map_err(|e| OxoError::MalformedMetadata(e.to_string()))?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(mapping) => Ok(Self(mapping)),
            other => Err(OxoError::MalformedMetadata(format!(
                "expected a mapping at the top level, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Read a standalone YAML metadata file.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, OxoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| OxoError::IoError(format!("read {}: {}", path.display(), e)))?;
        Self::parse_yaml(&text)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Raw value of a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The prefix → namespace map. Absent key gives an empty map.
    pub fn curie_map(&self) -> Result<BTreeMap<String, String>, OxoError> {
        let Some(value) = self.get(CURIE_MAP_KEY) else {
            return Ok(BTreeMap::new());
        };
        let mapping = match value {
            Value::Null => return Ok(BTreeMap::new()),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(OxoError::MalformedMetadata(format!(
                    "{} must be a mapping, found {}",
                    CURIE_MAP_KEY,
                    kind_of(other)
                )));
            }
        };

        mapping
            .iter()
            .map(|(prefix, namespace)| match (prefix, namespace) {
                (Value::String(p), Value::String(ns)) => Ok((p.clone(), ns.clone())),
                _ => Err(OxoError::MalformedMetadata(format!(
                    "{} entries must map strings to strings",
                    CURIE_MAP_KEY
                ))),
            })
            .collect()
    }

    /// The `mapping_date`, if present.
    pub fn mapping_date(&self) -> Result<Option<NaiveDate>, OxoError> {
        match self.get(MAPPING_DATE_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => NaiveDate::parse_from_str(raw.trim(), MAPPING_DATE_FORMAT)
                .map(Some)
                .map_err(|e| {
                    OxoError::MalformedMetadata(format!(
                        "{} '{}' is not an ISO date: {}",
                        MAPPING_DATE_KEY, raw, e
                    ))
                }),
            Some(other) => Err(OxoError::MalformedMetadata(format!(
                "{} must be a date string, found {}",
                MAPPING_DATE_KEY,
                kind_of(other)
            ))),
        }
    }

    /// Overlay `other` on top of `self`, key by key. `other` wins.
    pub fn merge(&mut self, other: Metadata) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    /// Render as a YAML document.
    pub fn to_yaml(&self) -> Result<String, OxoError> {
        serde_yaml::to_string(&self.0).map_err(|e| OxoError::SerializationError(e.to_string()))
    }

    /// Write as a standalone YAML file.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), OxoError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml()?)
            .map_err(|e| OxoError::IoError(format!("write {}: {}", path.display(), e)))
    }
}

/// Metadata and body extracted from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<'a> {
    pub metadata: Metadata,
    pub body: &'a str,
    /// Number of metadata lines before the body.
    pub header_lines: usize,
}

/// Extract the embedded metadata block of `text`.
pub fn extract(text: &str) -> Result<Extracted<'_>, OxoError> {
    let front = split_front_matter(text);
    Ok(Extracted {
        metadata: Metadata::parse_yaml(&front.header)?,
        body: front.body,
        header_lines: front.lines,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

// =============================================================================
// TESTS
// =============================================================================
