// harness.rs - The API tests actually call
//
// A RealDatabase sets up a real database for testing. By default that is a
// private in-memory SQLite database; with TEST_DB_URL set it is whatever that
// points at, and every table in it is dropped before and after the tests.
//
// Typical use:
//
//   let db = RealDatabase::set_up(catalog, &TestDbConfig::from_env(), true).await?;
//   db.load(rows, &[]).await?;
//   ... run the test ...
//   db.tear_down().await?;
//
// or let `with_test_db` do the setup and teardown around a closure.

use std::future::Future;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::channel::ExecutionChannel;
use crate::cleanup::{self, table_inventory, CleanReport};
use crate::config::TestDbConfig;
use crate::error::{FixtureError, Result};
use crate::fixtures::{Fixture, Row};
use crate::loader::{self, LoadReport};
use crate::materializer::{self, CreateOutcome};
use crate::schema::Catalog;

/// A test database plus the channel that serializes access to it
#[derive(Debug, Clone)]
pub struct RealDatabase {
    catalog: Arc<Catalog>,
    db_url: String,
    using_memory_db: bool,
    channel: Option<ExecutionChannel>,
}

impl RealDatabase {
    /// Prepare the database described by `config`.
    ///
    /// With `want_pool` the execution channel is started and the database is
    /// cleaned once, so leftovers from an earlier run cannot leak in. Without
    /// it nothing is opened or cleaned, and only the URL is available.
    pub async fn set_up(catalog: Arc<Catalog>, config: &TestDbConfig, want_pool: bool) -> Result<Self> {
        config.dialect()?;

        let mut db = Self {
            catalog,
            db_url: config.url().to_string(),
            using_memory_db: config.is_memory(),
            channel: None,
        };

        if !want_pool {
            return Ok(db);
        }

        let channel = ExecutionChannel::open(config.url())?;

        tracing::info!(db_url = %db.db_url, memory = db.using_memory_db, "cleaning database");
        cleanup::clean(&channel, db.catalog.clone()).await?;

        db.channel = Some(channel);
        Ok(db)
    }

    /// Clean the database again. A no-op when set up without a pool.
    pub async fn tear_down(&self) -> Result<()> {
        match &self.channel {
            Some(channel) => {
                let report = cleanup::clean(channel, self.catalog.clone()).await?;
                log_orphans(&report);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Insert `rows` in dependency order, creating the tables they need plus
    /// `extra_tables`.
    ///
    /// Row order does not matter across tables. Within one table rows are
    /// inserted in the order given.
    pub async fn load(&self, rows: Vec<Row>, extra_tables: &[&str]) -> Result<LoadReport> {
        loader::load(self.channel()?, self.catalog.clone(), rows, extra_tables).await
    }

    /// Load a reusable [`Fixture`]
    pub async fn load_fixture<F: Fixture>(&self) -> Result<LoadReport> {
        self.load(F::rows(), F::extra_tables()).await
    }

    /// Create tables without inserting any data into them
    pub async fn create_tables_only(&self, tables: &[&str]) -> Result<Vec<(String, CreateOutcome)>> {
        materializer::create_tables_only(self.channel()?, self.catalog.clone(), tables).await
    }

    /// Tables that currently exist in the store, sorted by name
    pub async fn table_names(&self) -> Result<Vec<String>> {
        let channel = self.channel()?;
        let dialect = channel.dialect();
        channel
            .submit(move |conn| Box::pin(async move { table_inventory(conn, dialect).await }))
            .await
    }

    /// Close the connection once queued work has finished
    pub async fn close(&self) -> Result<()> {
        match &self.channel {
            Some(channel) => channel.close().await,
            None => Ok(()),
        }
    }

    pub fn channel(&self) -> Result<&ExecutionChannel> {
        self.channel.as_ref().ok_or(FixtureError::NoPool)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn db_url(&self) -> &str {
        &self.db_url
    }

    pub fn using_memory_db(&self) -> bool {
        self.using_memory_db
    }
}

fn log_orphans(report: &CleanReport) {
    if !report.orphans.is_empty() {
        tracing::warn!(
            orphans = ?report.orphans,
            "teardown found tables outside the catalog"
        );
    }
}

/// Full setup and teardown around a test body.
///
/// Teardown runs even when the body fails; the body's result is returned
/// after it.
pub async fn with_test_db<F, Fut>(catalog: Arc<Catalog>, config: &TestDbConfig, test_fn: F) -> anyhow::Result<()>
where
    F: FnOnce(RealDatabase) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let db = RealDatabase::set_up(catalog, config, true).await?;

    let result = test_fn(db.clone()).await;

    // Always cleanup, even if test fails
    db.tear_down().await?;

    result
}

/// Route `tracing` output through the test harness, filtered by RUST_LOG.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_test_writer()
        .try_init();
}
