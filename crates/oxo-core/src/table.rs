//! # Tabular Data
//!
//! Tab-delimited tables with a header row, as consumed by the loader and
//! produced by the preprocessing pipeline.
//!
//! A `Row` is a column → value map that remembers the line it was read
//! from, so errors raised far downstream still point at the input file.
//! Unset cells are written back as empty fields.

use crate::OxoError;
use crate::preprocess::metadata::split_front_matter;
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// ROW
// =============================================================================

/// One data row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    line: usize,
    fields: BTreeMap<String, String>,
}

impl Row {
    /// Create an empty row read from `line` (1-based, in the source file).
    #[must_use]
    pub fn new(line: usize) -> Self {
        Self {
            line,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    /// Source line of this row.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Raw cell value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Cell value, or `None` if absent or blank after trimming.
    #[must_use]
    pub fn non_blank(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.trim().is_empty())
    }

    /// Set a cell.
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.fields.insert(column.to_string(), value.into());
    }
}

// =============================================================================
// TABLE
// =============================================================================

/// A header plus rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Header columns in output order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the header contains `column`.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Fail with `MissingColumn` on the first required column not in the header.
    pub fn require_columns(&self, required: &[&str]) -> Result<(), OxoError> {
        match required.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(OxoError::MissingColumn((*missing).to_string())),
            None => Ok(()),
        }
    }

    /// Append `column` to the header unless it is already present.
    pub fn ensure_column(&mut self, column: &str) {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
    }

    /// Replace every row with `f(row)`, stopping at the first error.
    pub fn map_rows(
        self,
        f: impl Fn(Row) -> Result<Row, OxoError>,
    ) -> Result<Self, OxoError> {
        let rows = self.rows.into_iter().map(f).collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            columns: self.columns,
            rows,
        })
    }

    // =========================================================================
    // TSV I/O
    // =========================================================================

    /// Parse a tab-delimited body whose header sits on file line `header_line`.
    pub fn from_tsv(body: &str, header_line: usize) -> Result<Self, OxoError> {
        let line_offset = header_line.saturating_sub(1);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(body.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| malformed(&e, line_offset))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| malformed(&e, line_offset))?;
            let line = record
                .position()
                .map(|p| p.line() as usize + line_offset)
                .unwrap_or(header_line + index + 1);

            let mut row = Row::new(line);
            for (column, value) in columns.iter().zip(record.iter()) {
                row.set(column, value);
            }
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Read a tab-delimited file, skipping any leading metadata comment lines.
    pub fn read_tsv(path: impl AsRef<Path>) -> Result<Self, OxoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| OxoError::IoError(format!("read {}: {}", path.display(), e)))?;
        let front = split_front_matter(&text);
        Self::from_tsv(front.body, front.lines + 1)
    }

    /// Render as tab-delimited text with a header row.
    pub fn to_tsv(&self) -> Result<String, OxoError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());

        writer
            .write_record(&self.columns)
            .map_err(|e| OxoError::SerializationError(e.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(self.columns.iter().map(|c| row.get(c).unwrap_or("")))
                .map_err(|e| OxoError::SerializationError(e.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| OxoError::SerializationError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| OxoError::SerializationError(e.to_string()))
    }

    /// Write as a tab-delimited file.
    pub fn write_tsv(&self, path: impl AsRef<Path>) -> Result<(), OxoError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_tsv()?)
            .map_err(|e| OxoError::IoError(format!("write {}: {}", path.display(), e)))
    }
}

fn malformed(error: &csv::Error, line_offset: usize) -> OxoError {
    OxoError::MalformedRow {
        line: error
            .position()
            .map(|p| p.line() as usize + line_offset)
            .unwrap_or(0),
        reason: error.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
