// cleanup.rs - Return the database to an empty state
//
// Cleaning happens in two passes:
// 1. drop every catalog table, dependents before their dependencies,
//    ignoring tables that were never created;
// 2. ask the store which tables actually exist and drop those too.
//
// The second pass catches tables the catalog no longer knows about: leftovers
// of a crashed run, an older schema, or a test that created tables by hand.
// It is best effort. A store that cannot list its tables skips it.

use std::sync::Arc;

use sqlx::AnyConnection;

use crate::channel::ExecutionChannel;
use crate::error::{FixtureError, Result};
use crate::schema::{Catalog, Dialect};

/// What a cleaning pass removed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    /// Catalog tables a drop was issued for (present or not)
    pub catalog_tables: usize,
    /// Tables found in the store that the catalog does not define
    pub orphans: Vec<String>,
}

/// Names of all user tables currently in the store
pub async fn table_inventory(conn: &mut AnyConnection, dialect: Dialect) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(dialect.list_tables_sql())
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Run a full cleaning pass as one operation on the channel
pub async fn clean(channel: &ExecutionChannel, catalog: Arc<Catalog>) -> Result<CleanReport> {
    let dialect = channel.dialect();
    channel
        .submit(move |conn| Box::pin(async move { clean_database(conn, &catalog, dialect).await }))
        .await
}

/// Drop catalog tables, then anything else the store reports.
///
/// Safe to call on an empty or half-populated database, and safe to call
/// twice in a row.
pub async fn clean_database(
    conn: &mut AnyConnection,
    catalog: &Catalog,
    dialect: Dialect,
) -> Result<CleanReport> {
    let relax = dialect.relax_foreign_keys_sql();
    if let Some((off, _)) = relax {
        sqlx::query(off).execute(&mut *conn).await?;
    }

    let outcome = drop_everything(conn, catalog, dialect).await;

    let restored = match relax {
        Some((_, on)) => sqlx::query(on).execute(&mut *conn).await.map(|_| ()),
        None => Ok(()),
    };

    let report = outcome?;
    restored?;
    Ok(report)
}

async fn drop_everything(
    conn: &mut AnyConnection,
    catalog: &Catalog,
    dialect: Dialect,
) -> Result<CleanReport> {
    let mut report = CleanReport::default();

    for table in catalog.all_tables().iter().rev() {
        drop_table(conn, dialect, table.name()).await?;
        report.catalog_tables += 1;
    }

    let leftovers = match table_inventory(conn, dialect).await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "cannot list tables, skipping leftover-table cleanup");
            return Ok(report);
        }
    };

    for name in leftovers {
        tracing::warn!(table = %name, "dropping table not defined in the catalog");
        match drop_table(conn, dialect, &name).await {
            Ok(()) => report.orphans.push(name),
            Err(e) => tracing::warn!(table = %name, error = %e, "could not drop leftover table"),
        }
    }

    Ok(report)
}

async fn drop_table(conn: &mut AnyConnection, dialect: Dialect, table: &str) -> Result<()> {
    sqlx::query(&dialect.drop_table_sql(table))
        .execute(&mut *conn)
        .await
        .map_err(|source| FixtureError::DropTable {
            table: table.to_string(),
            source,
        })?;
    tracing::debug!(table, "dropped table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, TableDef};

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new(vec![
                TableDef::new("parent").column(ColumnDef::integer("id").primary_key()),
                TableDef::new("child")
                    .column(ColumnDef::integer("id").primary_key())
                    .column(ColumnDef::integer("parent_id"))
                    .foreign_key("parent_id", "parent", "id"),
            ])
            .unwrap(),
        )
    }

    async fn inventory(channel: &ExecutionChannel) -> Vec<String> {
        let dialect = channel.dialect();
        channel
            .submit(move |conn| Box::pin(async move { table_inventory(conn, dialect).await }))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_clean_empty_store() {
        let channel = ExecutionChannel::open("sqlite::memory:").unwrap();
        let report = clean(&channel, catalog()).await.unwrap();
        assert_eq!(report.catalog_tables, 2);
        assert!(report.orphans.is_empty());
        assert!(inventory(&channel).await.is_empty());
    }

    #[tokio::test]
    async fn test_clean_drops_populated_catalog_tables() {
        let channel = ExecutionChannel::open("sqlite::memory:").unwrap();
        let catalog = catalog();
        let ddl: Vec<String> = catalog
            .all_tables()
            .iter()
            .map(|t| t.create_sql(Dialect::Sqlite))
            .collect();

        channel
            .submit(move |conn| {
                Box::pin(async move {
                    for sql in &ddl {
                        sqlx::query(sql).execute(&mut *conn).await?;
                    }
                    sqlx::query("INSERT INTO parent (id) VALUES (1)").execute(&mut *conn).await?;
                    sqlx::query("INSERT INTO child (id, parent_id) VALUES (10, 1)")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .await
            .unwrap();
        assert_eq!(inventory(&channel).await, vec!["child", "parent"]);

        let report = clean(&channel, catalog.clone()).await.unwrap();
        assert!(report.orphans.is_empty());
        assert!(inventory(&channel).await.is_empty());

        // And again, on the now empty store
        clean(&channel, catalog).await.unwrap();
        assert!(inventory(&channel).await.is_empty());
    }

    #[tokio::test]
    async fn test_clean_drops_orphans_with_foreign_keys_between_them() {
        let channel = ExecutionChannel::open("sqlite::memory:").unwrap();
        channel
            .submit(|conn| {
                Box::pin(async move {
                    sqlx::query("CREATE TABLE legacy_owner (id INTEGER PRIMARY KEY)")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query(
                        "CREATE TABLE legacy_item (id INTEGER PRIMARY KEY, \
                         owner_id INTEGER REFERENCES legacy_owner (id))",
                    )
                    .execute(&mut *conn)
                    .await?;
                    sqlx::query("INSERT INTO legacy_owner (id) VALUES (1)")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("INSERT INTO legacy_item (id, owner_id) VALUES (1, 1)")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .await
            .unwrap();

        let report = clean(&channel, catalog()).await.unwrap();
        assert_eq!(report.orphans, vec!["legacy_item", "legacy_owner"]);
        assert!(inventory(&channel).await.is_empty());
    }
}
