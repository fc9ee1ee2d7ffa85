/// Result rows and the query result envelope
///
/// Rows are converted into named mappings at the executor boundary so no
/// code downstream ever depends on column position.

use indexmap::IndexMap;
use rusqlite::types::Value as SqlValue;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// A single result row: an insertion-ordered column name → value mapping
///
/// Column names are unique within a row; the executor renames repeated
/// result columns before they get here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: IndexMap<String, Value>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Build a row from `(column, value)` pairs, keeping their order
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut row = Self::new();
        for (name, value) in pairs {
            row.insert(name, value);
        }
        row
    }

    /// Look up a column by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a column, replacing the existing value in place if present
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Builder-style variant of [`Row::insert`]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Numeric value of a column; null, missing and non-numeric give `None`
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Integer value of a column
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Text value of a column
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Column names in result order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `(column, value)` pairs in result order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(column, value)| (column.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Internal echo of what was executed
///
/// Kept for logging and debugging only; never serialized into a user-facing
/// response.
#[derive(Debug, Clone, Default)]
pub struct QueryMetadata {
    pub query: String,
    pub params: Vec<SqlValue>,
    /// The row cap from the server settings was hit
    pub truncated: bool,
}

/// Uniform envelope returned by every query execution
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryResult {
    rows: Vec<Row>,
    row_count: usize,
    elapsed_ms: f64,
    #[serde(skip)]
    metadata: QueryMetadata,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>, elapsed_ms: f64, metadata: QueryMetadata) -> Self {
        Self {
            row_count: rows.len(),
            rows,
            elapsed_ms,
            metadata,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Wall-clock time spent executing and fetching, in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn metadata(&self) -> &QueryMetadata {
        &self.metadata
    }

    pub fn is_truncated(&self) -> bool {
        self.metadata.truncated
    }

    /// First row, for single-row aggregate queries
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}
