use serde::{Serialize, Serializer};

use crate::types::RowValue;

/// Driver-agnostic raw result from a database query.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQueryResult {
    /// Column names in order
    pub columns: Vec<String>,
    /// Rows, where each row is a vector of values in column order
    pub rows: Vec<Vec<RowValue>>,
}

impl RawQueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<RowValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Converts the raw result into column-keyed rows.
    pub fn into_rows(self) -> Vec<Row> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|values| Row::new(&columns, values))
            .collect()
    }
}

/// A single result row, keyed by column name in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    entries: Vec<(String, RowValue)>,
}

impl Row {
    /// Creates a new Row from column names and values.
    pub fn new(columns: &[String], values: Vec<RowValue>) -> Self {
        let entries = columns.iter().cloned().zip(values).collect();
        Self { entries }
    }

    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<C, V>(pairs: impl IntoIterator<Item = (C, V)>) -> Self
    where
        C: Into<String>,
        V: Into<RowValue>,
    {
        let entries = pairs
            .into_iter()
            .map(|(col, val)| (col.into(), val.into()))
            .collect();
        Self { entries }
    }

    /// Gets a value by column name.
    ///
    /// If a column name repeats, the last occurrence wins.
    pub fn get(&self, column: &str) -> Option<&RowValue> {
        self.entries
            .iter()
            .rev()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Returns all column names in this row.
    pub fn columns(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}
