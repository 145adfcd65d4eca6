// lib.rs - Root module for the fixture_db library
//
// fixture_db provisions a throwaway database for a test, creates the tables a
// test's fixture rows need in foreign-key order, inserts the rows, and wipes
// everything again afterwards. All database work is funneled through one
// ExecutionChannel so the connection is never used by two tasks at once.

/// Errors and the crate-wide Result alias
pub mod error;

/// Which database to use (in-memory by default, TEST_DB_URL to override)
pub mod config;

/// Table definitions, the dependency-ordered catalog, and SQL dialects
pub mod schema;

/// Rows, values, and reusable fixture sets
pub mod fixtures;

pub mod channel;
pub mod cleanup;
pub mod harness;
pub mod loader;
pub mod materializer;

pub use channel::{BoxFuture, ExecutionChannel};
pub use cleanup::CleanReport;
pub use config::TestDbConfig;
pub use error::{FixtureError, Result};
pub use fixtures::{Fixture, Row, Value};
pub use harness::{init_tracing, with_test_db, RealDatabase};
pub use loader::LoadReport;
pub use materializer::CreateOutcome;
pub use schema::{Catalog, ColumnDef, ColumnType, Dialect, ForeignKey, TableDef};
