// error.rs - Error taxonomy for fixture loading
//
// Two broad classes:
// - configuration errors: the caller asked for something the catalog or the
//   harness does not know about. Never retried.
// - store errors: the database refused a statement. Logged with context by the
//   component that issued it, then handed back unchanged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FixtureError>;

#[derive(Debug, Error)]
pub enum FixtureError {
    /// A row or an extra-table request named a table the catalog does not define
    #[error("unknown table `{0}`: not defined in the schema catalog")]
    UnknownTable(String),

    /// The catalog definition itself is inconsistent (duplicates, bad references, cycles)
    #[error("invalid schema catalog: {0}")]
    InvalidCatalog(String),

    #[error("unsupported database url `{0}` (expected sqlite: or postgres:)")]
    UnsupportedDatabase(String),

    /// The harness was set up without a pool, so there is no handle to work on
    #[error("no database pool: set_up was called with want_pool = false")]
    NoPool,

    #[error("failed to create table `{table}`: {source}")]
    CreateTable {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to insert into `{table}` values {values}: {source}")]
    Insert {
        table: String,
        values: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to drop table `{table}`: {source}")]
    DropTable {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The execution channel's worker has stopped (closed or panicked)
    #[error("execution channel is closed")]
    ChannelClosed,
}

impl FixtureError {
    /// True for caller/schema mismatches that retrying can never fix.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            FixtureError::UnknownTable(_)
                | FixtureError::InvalidCatalog(_)
                | FixtureError::UnsupportedDatabase(_)
                | FixtureError::NoPool
        )
    }

    /// The table this error is about, when there is one.
    pub fn table(&self) -> Option<&str> {
        match self {
            FixtureError::UnknownTable(table) => Some(table.as_str()),
            FixtureError::CreateTable { table, .. }
            | FixtureError::Insert { table, .. }
            | FixtureError::DropTable { table, .. } => Some(table.as_str()),
            _ => None,
        }
    }
}
