// schema/dialect.rs - The bits of SQL that differ between stores
//
// Everything else in the crate builds statements through this type, so
// adding a store means adding a variant here and nowhere else.

use crate::error::{FixtureError, Result};
use crate::schema::ColumnType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Pick the dialect from a connection URL's scheme
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            _ => Err(FixtureError::UnsupportedDatabase(url.to_string())),
        }
    }

    /// Quote an identifier, doubling embedded quotes
    pub fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    pub fn column_type(&self, ty: ColumnType) -> &'static str {
        match (self, ty) {
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (Dialect::Postgres, ColumnType::Integer) => "BIGINT",
            (_, ColumnType::Text) => "TEXT",
            (_, ColumnType::Boolean) => "BOOLEAN",
            (Dialect::Sqlite, ColumnType::Blob) => "BLOB",
            (Dialect::Postgres, ColumnType::Blob) => "BYTEA",
        }
    }

    /// Bind placeholder for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", index),
        }
    }

    /// Query returning one text column: every user table in the live store
    pub fn list_tables_sql(&self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
                 ORDER BY name"
            }
            Dialect::Postgres => {
                "SELECT tablename::text FROM pg_catalog.pg_tables \
                 WHERE schemaname = current_schema() \
                 ORDER BY tablename"
            }
        }
    }

    /// Drop statement that tolerates a missing table
    pub fn drop_table_sql(&self, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!("DROP TABLE IF EXISTS {}", self.quote(table)),
            Dialect::Postgres => format!("DROP TABLE IF EXISTS {} CASCADE", self.quote(table)),
        }
    }

    /// Insert statement for `columns`, each paired with whether its value is NULL.
    ///
    /// NULLs are written as literals; placeholders count only the other
    /// columns, so bind just the non-null values in column order.
    pub fn insert_sql(&self, table: &str, columns: &[(&str, bool)]) -> String {
        if columns.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES", self.quote(table));
        }

        let names: Vec<String> = columns.iter().map(|(c, _)| self.quote(c)).collect();

        let mut bound = 0;
        let params: Vec<String> = columns
            .iter()
            .map(|&(_, is_null)| {
                if is_null {
                    "NULL".to_string()
                } else {
                    bound += 1;
                    self.placeholder(bound)
                }
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote(table),
            names.join(", "),
            params.join(", ")
        )
    }

    /// Statements suspending and restoring foreign-key checks around a cleaning pass
    pub fn relax_foreign_keys_sql(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Dialect::Sqlite => Some(("PRAGMA foreign_keys = OFF", "PRAGMA foreign_keys = ON")),
            // CASCADE on each drop already covers this
            Dialect::Postgres => None,
        }
    }
}
