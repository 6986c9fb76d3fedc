use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::error::{ErrorCode, SociogramError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("table has no columns")]
    NoColumns,
    #[error("duplicate column label: {0}")]
    DuplicateColumn(String),
    #[error("row {row} has {actual} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("row {row} column set differs from the header: missing {missing:?}, unexpected {unexpected:?}")]
    ColumnSetMismatch {
        row: usize,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
}

impl SociogramError for TableError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}

/// Survey responses as delivered by ingestion. Every row carries a value for
/// every column; empty answers are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        if columns.is_empty() {
            return Err(TableError::NoColumns);
        }
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(TableError::RowWidth {
                    row,
                    expected: columns.len(),
                    actual: cells.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Builds a table from label→value records. The first record fixes the
    /// column order; all records must carry exactly the same labels.
    pub fn from_records<I, R, K, V>(records: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();

        for (row_idx, record) in records.into_iter().enumerate() {
            let record: Vec<(String, String)> = record
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect();

            if row_idx == 0 {
                columns = record.iter().map(|(k, _)| k.clone()).collect();
            }

            let mut by_label: BTreeMap<String, String> = record.into_iter().collect();
            let missing: Vec<String> = columns
                .iter()
                .filter(|c| !by_label.contains_key(*c))
                .cloned()
                .collect();
            let unexpected: Vec<String> = by_label
                .keys()
                .filter(|k| !columns.contains(k))
                .cloned()
                .collect();
            if !missing.is_empty() || !unexpected.is_empty() {
                return Err(TableError::ColumnSetMismatch {
                    row: row_idx,
                    missing,
                    unexpected,
                });
            }

            let cells = columns
                .iter()
                .map(|c| by_label.remove(c).unwrap_or_default())
                .collect();
            rows.push(cells);
        }

        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.column_index(label).is_some()
    }

    /// Resolves a possibly sloppy label (surrounding whitespace) to the
    /// table's own spelling.
    pub fn find_column(&self, label: &str) -> Option<&str> {
        if let Some(idx) = self.column_index(label) {
            return Some(&self.columns[idx]);
        }
        let trimmed = label.trim();
        self.columns
            .iter()
            .find(|c| c.trim() == trimmed)
            .map(String::as_str)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|cells| cells[idx].as_str())
    }

    fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }
}
