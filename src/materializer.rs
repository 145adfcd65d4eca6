// materializer.rs - Create catalog tables in dependency order
//
// Creation is idempotent: a table that already exists (say, left behind by a
// teardown that failed) is reported as such and skipped, so one bad cleanup
// does not fail every test that follows it.
//
// There is no rollback. If the Nth table fails, the tables before it stay.

use std::collections::HashSet;
use std::sync::Arc;

use sqlx::AnyConnection;

use crate::channel::ExecutionChannel;
use crate::cleanup::table_inventory;
use crate::error::{FixtureError, Result};
use crate::schema::{Catalog, Dialect, TableDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExisted,
}

/// Create `names` (plus nothing else) in catalog order.
///
/// Returns each planned table with what happened to it, in creation order.
pub async fn create_tables<I, S>(
    conn: &mut AnyConnection,
    dialect: Dialect,
    catalog: &Catalog,
    names: I,
) -> Result<Vec<(String, CreateOutcome)>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let plan = catalog.plan(names)?;
    materialize(conn, dialect, &plan).await
}

/// Create the tables of an already computed plan, in the order given
pub async fn materialize(
    conn: &mut AnyConnection,
    dialect: Dialect,
    plan: &[&TableDef],
) -> Result<Vec<(String, CreateOutcome)>> {
    if plan.is_empty() {
        return Ok(Vec::new());
    }

    let existing: HashSet<String> = table_inventory(conn, dialect).await?.into_iter().collect();

    let mut outcomes = Vec::with_capacity(plan.len());
    for table in plan {
        let outcome = if existing.contains(table.name()) {
            tracing::debug!(table = table.name(), "table already exists");
            CreateOutcome::AlreadyExisted
        } else {
            create_table(conn, dialect, table).await?;
            CreateOutcome::Created
        };
        outcomes.push((table.name().to_string(), outcome));
    }

    Ok(outcomes)
}

async fn create_table(conn: &mut AnyConnection, dialect: Dialect, table: &TableDef) -> Result<()> {
    let sql = table.create_sql(dialect);
    sqlx::query(&sql).execute(&mut *conn).await.map_err(|source| {
        tracing::error!(table = table.name(), error = %source, "failed to create table");
        FixtureError::CreateTable {
            table: table.name().to_string(),
            source,
        }
    })?;
    tracing::debug!(table = table.name(), "created table");
    Ok(())
}

/// Create tables as one operation on the channel, without inserting rows
pub async fn create_tables_only(
    channel: &ExecutionChannel,
    catalog: Arc<Catalog>,
    names: &[&str],
) -> Result<Vec<(String, CreateOutcome)>> {
    let dialect = channel.dialect();
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();

    // Unknown names fail here, before anything is queued
    catalog.plan(&names)?;

    channel
        .submit(move |conn| {
            Box::pin(async move { create_tables(conn, dialect, &catalog, &names).await })
        })
        .await
}
