//! Result rows
//!
//! Values arrive in Postgres text format, exactly as the server renders them;
//! NULL is `None`. Rows produced by buffered execution and by cursor streaming
//! have the same shape.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::str::FromStr;
use std::sync::Arc;

/// A single result row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl Row {
    /// Create a row
    ///
    /// `columns` is shared by every row of a result set.
    pub fn new(columns: Arc<[String]>, values: Vec<Option<String>>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Column names, in result order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `idx`; `None` for NULL or out of range
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    /// Raw value of column `name`; the first match wins on duplicate names
    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.get(idx))
    }

    /// Parse the value at `idx`
    ///
    /// Returns `None` for NULL, out-of-range positions, and unparsable text.
    pub fn parse<T: FromStr>(&self, idx: usize) -> Option<T> {
        self.get(idx).and_then(|v| v.parse().ok())
    }

    /// Iterate over `(column, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(|v| v.as_deref()))
    }

    /// Consume the row, returning its values
    pub fn into_values(self) -> Vec<Option<String>> {
        self.values
    }

    /// Convert to a JSON object keyed by column name
    ///
    /// On duplicate column names the first value wins, as with
    /// [`get_by_name`](Self::get_by_name).
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.len());
        for (name, value) in self.unique_entries() {
            let value = value
                .map(|v| serde_json::Value::String(v.to_string()))
                .unwrap_or(serde_json::Value::Null);
            map.insert(name.to_string(), value);
        }
        serde_json::Value::Object(map)
    }

    /// `(column, value)` pairs, skipping later repeats of a column name
    fn unique_entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.iter()
            .enumerate()
            .filter(|(idx, (name, _))| !self.columns[..*idx].iter().any(|c| c == name))
            .map(|(_, entry)| entry)
    }
}

/// Serialized as a map; duplicate column names keep their first value
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, value) in self.unique_entries() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string(), "note".to_string()].into();
        Row::new(
            columns,
            vec![Some("42".into()), Some("alice".into()), None],
        )
    }

    #[test]
    fn test_positional_and_named_access() {
        let row = sample();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(1), Some("alice"));
        assert_eq!(row.get_by_name("name"), Some("alice"));
        assert_eq!(row.get(2), None);
        assert_eq!(row.get(9), None);
        assert_eq!(row.get_by_name("missing"), None);
    }

    #[test]
    fn test_parse() {
        let row = sample();
        assert_eq!(row.parse::<i64>(0), Some(42));
        assert_eq!(row.parse::<i64>(1), None);
        assert_eq!(row.parse::<i64>(2), None);
    }

    #[test]
    fn test_serialize_as_object() {
        let row = sample();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"id":"42","name":"alice","note":null}"#);
        assert_eq!(row.to_json()["name"], "alice");
        assert!(row.to_json()["note"].is_null());
    }

    #[test]
    fn test_duplicate_columns_keep_first_value() {
        let columns: Arc<[String]> = vec!["a".to_string(), "a".to_string()].into();
        let row = Row::new(columns, vec![Some("1".into()), Some("2".into())]);

        assert_eq!(row.get_by_name("a"), Some("1"));
        assert_eq!(row.to_json(), serde_json::json!({"a": "1"}));
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"a":"1"}"#);
    }
}
