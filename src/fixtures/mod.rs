// fixtures/mod.rs - Test fixtures: rows to seed a test database with
//
// What is a fixture?
// The set of tables and rows a test needs before it can run. Test authors
// describe rows as plain data (table name + column values) and hand them to
// the loader in any order; the loader works out which tables to create and
// in which order to insert.
//
// Values are passed to the store as-is. The loader never converts them.

pub mod tables;

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Boolean(bool),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One row destined for `table`. Column order is kept as given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub table: String,
    #[serde(serialize_with = "serialize_columns")]
    pub values: Vec<(String, Value)>,
}

impl Row {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    /// Set `column`, replacing an earlier value for the same column
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column, value)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    /// The column values as a JSON object, for diagnostics
    pub fn values_json(&self) -> String {
        let columns = Columns(&self.values);
        serde_json::to_string(&columns).unwrap_or_else(|_| format!("{:?}", self.values))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row(table={}, values={})", self.table, self.values_json())
    }
}

struct Columns<'a>(&'a [(String, Value)]);

impl Serialize for Columns<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn serialize_columns<S: Serializer>(
    values: &[(String, Value)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    Columns(values).serialize(serializer)
}

/// A reusable bundle of fixture rows
///
/// Implement this for a unit struct and hand it to
/// [`RealDatabase::load_fixture`](crate::harness::RealDatabase::load_fixture).
pub trait Fixture {
    /// Rows to insert, in any order
    fn rows() -> Vec<Row>;

    /// Tables to create without inserting anything into them
    fn extra_tables() -> &'static [&'static str] {
        &[]
    }
}
