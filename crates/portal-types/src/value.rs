//! Row values exchanged with the store.
//!
//! - [`Value`]: a single typed cell
//! - [`ContentValues`]: a column → value map used for inserts, updates
//!   and assertion expectations
//! - [`RowSet`]: a materialized query result
//!
//! Comparisons made by assertions use the *string form* of a value
//! ([`Value::as_text`]), so `Integer(1)` and `Text("1")` compare equal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL-style null.
    Null,
    /// Boolean, rendered as `1` / `0`.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point.
    Real(f64),
    /// Text.
    Text(String),
    /// Raw bytes, rendered as lowercase hex.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the string form used for comparisons, or `None` for null.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Real(r) => Some(r.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Blob(bytes) => {
                let mut out = String::with_capacity(bytes.len() * 2);
                for b in bytes {
                    let _ = write!(out, "{b:02x}");
                }
                Some(out)
            }
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Column → value map, ordered by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentValues(BTreeMap<String, Value>);

impl ContentValues {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column` to `value`, replacing any previous value.
    pub fn put(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    /// Builder-style [`put`](Self::put).
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(column, value);
        self
    }

    /// Returns the value for `column`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Returns the string form of the value for `column`.
    #[must_use]
    pub fn get_as_text(&self, column: &str) -> Option<String> {
        self.0.get(column).and_then(Value::as_text)
    }

    /// Returns `true` if `column` is present.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Returns the column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no column is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ContentValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A materialized query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Creates an empty result over `columns`.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. Short rows are padded with nulls, long rows are
    /// truncated to the column count.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Builder-style [`push_row`](Self::push_row).
    #[must_use]
    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.push_row(row);
        self
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of `column`, if present.
    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Cell at `(row, column)` by column name.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// String form of the cell at `(row, column)`.
    #[must_use]
    pub fn text(&self, row: usize, column: &str) -> Option<String> {
        self.get(row, column).and_then(Value::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_forms() {
        assert_eq!(Value::Null.as_text(), None);
        assert_eq!(Value::from(true).as_text().as_deref(), Some("1"));
        assert_eq!(Value::from(42_i64).as_text().as_deref(), Some("42"));
        assert_eq!(Value::from("two").as_text().as_deref(), Some("two"));
        assert_eq!(Value::from(vec![0x0a, 0xff]).as_text().as_deref(), Some("0aff"));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn content_values_ordered_by_column() {
        let values = ContentValues::new().with("b", "two").with("a", 1);
        let cols: Vec<_> = values.columns().collect();
        assert_eq!(cols, vec!["a", "b"]);
        assert_eq!(values.get_as_text("a").as_deref(), Some("1"));
        assert!(values.contains("b"));
        assert!(!values.contains("c"));
    }

    #[test]
    fn row_set_lookup_by_name() {
        let rows = RowSet::new(["a", "b"])
            .with_row(vec![Value::from(1), Value::from("two")])
            .with_row(vec![Value::from(3)]);
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.text(0, "b").as_deref(), Some("two"));
        assert_eq!(rows.get(1, "b"), Some(&Value::Null));
        assert_eq!(rows.get(0, "missing"), None);
    }

    #[test]
    fn empty_row_set_keeps_columns() {
        let rows = RowSet::new(["x", "y"]);
        assert!(rows.is_empty());
        assert_eq!(rows.columns(), ["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn content_values_json_shape() {
        let values = ContentValues::new().with("n", 1).with("s", "x");
        let json = serde_json::to_string(&values).expect("serialize");
        assert_eq!(json, r#"{"n":1,"s":"x"}"#);
    }
}
