//! Result types exchanged with the connection collaborator

use serde::{Deserialize, Serialize};

/// A cell value as returned by the connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int64(i64),
    UInt64(u64),
    String(String),
    /// Raw bytes, as some drivers return `SHOW` output
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Text form of a non-NULL value; bytes are decoded lossily
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int64(v) => Some(v.to_string()),
            Value::UInt64(v) => Some(v.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

/// One result row; cells are looked up by position or by column name
#[derive(Debug, Clone)]
pub struct Row {
    pub values: Vec<Value>,
    columns: Vec<String>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Case-insensitive column lookup, the way MySQL matches column labels
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Text of the value at `index`, `None` for NULL or a missing column
    pub fn get_string(&self, index: usize) -> Option<String> {
        self.get(index).and_then(Value::to_text)
    }

    pub fn get_string_by_name(&self, name: &str) -> Option<String> {
        self.get_by_name(name).and_then(Value::to_text)
    }
}

/// Result set column
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColumnMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
    /// 0-based
    #[serde(default)]
    pub ordinal: usize,
}

/// Rows returned by a metadata query
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Outcome of a DDL statement
#[derive(Debug, Clone, Default)]
pub struct StatementResult {
    pub affected_rows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_by_name_ignores_case() {
        let row = Row::new(
            vec!["Key_name".to_string(), "Non_unique".to_string()],
            vec![Value::from("PRIMARY"), Value::Int64(0)],
        );

        assert_eq!(row.get_string_by_name("key_name").as_deref(), Some("PRIMARY"));
        assert_eq!(row.get_by_name("NON_UNIQUE").and_then(Value::as_i64), Some(0));
        assert_eq!(row.get_string(5), None);
    }

    #[test]
    fn test_text_of_bytes_and_null() {
        assert_eq!(Value::Bytes(b"utf8mb4".to_vec()).to_text().as_deref(), Some("utf8mb4"));
        assert_eq!(Value::Null.to_text(), None);
        assert_eq!(Value::UInt64(7).as_i64(), Some(7));
    }
}
