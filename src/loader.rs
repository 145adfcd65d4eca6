// loader.rs - Load fixture rows into the test database
//
// Rows arrive in whatever order the test author wrote them. The loader:
// 1. collects the tables they name, plus any "create but leave empty" tables;
// 2. creates exactly those tables, dependencies first;
// 3. inserts rows table by table in that same order, keeping the original
//    order of rows within a table.
//
// All of it runs as a single operation on the execution channel, so nothing
// else can touch the database between creating a table and filling it.

use std::collections::BTreeSet;
use std::sync::Arc;

use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;
use sqlx::AnyConnection;

use crate::channel::ExecutionChannel;
use crate::error::{FixtureError, Result};
use crate::fixtures::{Row, Value};
use crate::materializer::{materialize, CreateOutcome};
use crate::schema::{Catalog, Dialect, TableDef};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Planned tables in creation order, with what happened to each
    pub tables: Vec<(String, CreateOutcome)>,
    pub rows_inserted: usize,
}

/// Tables named by `rows` together with `extra_tables`
pub fn requested_tables<S: AsRef<str>>(rows: &[Row], extra_tables: &[S]) -> BTreeSet<String> {
    rows.iter()
        .map(|row| row.table.clone())
        .chain(extra_tables.iter().map(|t| t.as_ref().to_string()))
        .collect()
}

/// Create the needed tables and insert `rows`, as one channel operation
pub async fn load(
    channel: &ExecutionChannel,
    catalog: Arc<Catalog>,
    rows: Vec<Row>,
    extra_tables: &[&str],
) -> Result<LoadReport> {
    let dialect = channel.dialect();
    let requested = requested_tables(&rows, extra_tables);

    // Configuration errors surface before anything is queued
    catalog.plan(&requested)?;

    channel
        .submit(move |conn| {
            Box::pin(async move { load_rows(conn, dialect, &catalog, &rows, &requested).await })
        })
        .await
}

/// The body of [`load`], for callers already holding the connection
pub async fn load_rows(
    conn: &mut AnyConnection,
    dialect: Dialect,
    catalog: &Catalog,
    rows: &[Row],
    requested: &BTreeSet<String>,
) -> Result<LoadReport> {
    let plan = catalog.plan(requested)?;

    tracing::info!(tables = plan.len(), rows = rows.len(), "loading fixture");

    let tables = materialize(conn, dialect, &plan).await?;

    let mut rows_inserted = 0;
    for table in &plan {
        for row in rows {
            if row.table != table.name() {
                continue;
            }
            insert_row(conn, dialect, table, row).await?;
            rows_inserted += 1;
        }
    }

    Ok(LoadReport {
        tables,
        rows_inserted,
    })
}

async fn insert_row(
    conn: &mut AnyConnection,
    dialect: Dialect,
    table: &TableDef,
    row: &Row,
) -> Result<()> {
    let columns: Vec<(&str, bool)> = row
        .values
        .iter()
        .map(|(column, value)| (column.as_str(), value.is_null()))
        .collect();
    let sql = dialect.insert_sql(table.name(), &columns);

    // NULLs are inlined by the statement, only the rest is bound
    let query = row
        .values
        .iter()
        .filter(|(_, value)| !value.is_null())
        .fold(sqlx::query(&sql), |query, (_, value)| bind_value(query, value));

    match query.execute(&mut *conn).await {
        Ok(_) => {
            tracing::debug!(table = table.name(), "inserted fixture row");
            Ok(())
        }
        Err(source) => {
            let values = row.values_json();
            tracing::error!(
                table = table.name(),
                row = %values,
                error = %source,
                "while inserting fixture row"
            );
            Err(FixtureError::Insert {
                table: table.name().to_string(),
                values,
                source,
            })
        }
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &'q Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Null => query,
        Value::Integer(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Boolean(v) => query.bind(*v),
        Value::Blob(v) => query.bind(v.as_slice()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new(vec![
                TableDef::new("child")
                    .column(ColumnDef::integer("id").primary_key())
                    .column(ColumnDef::integer("parent_id").not_null())
                    .foreign_key("parent_id", "parent", "id"),
                TableDef::new("parent")
                    .column(ColumnDef::integer("id").primary_key())
                    .column(ColumnDef::text("name")),
                TableDef::new("attachments")
                    .column(ColumnDef::integer("id").primary_key())
                    .column(ColumnDef::boolean("public"))
                    .column(ColumnDef::blob("data")),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_requested_tables_union() {
        let rows = vec![
            Row::new("child").with("id", 1),
            Row::new("parent").with("id", 1),
            Row::new("child").with("id", 2),
        ];
        let set = requested_tables(&rows, &["attachments"]);
        let names: Vec<&str> = set.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["attachments", "child", "parent"]);
    }

    #[tokio::test]
    async fn test_load_child_before_parent_in_input() {
        let channel = ExecutionChannel::open("sqlite::memory:").unwrap();
        let rows = vec![
            Row::new("child").with("id", 10).with("parent_id", 1),
            Row::new("parent").with("id", 1).with("name", "one"),
        ];

        let report = load(&channel, catalog(), rows, &[]).await.unwrap();
        assert_eq!(report.rows_inserted, 2);
        let created: Vec<&str> = report.tables.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(created, vec!["parent", "child"]);
    }

    #[tokio::test]
    async fn test_values_pass_through() {
        let channel = ExecutionChannel::open("sqlite::memory:").unwrap();
        let rows = vec![Row::new("attachments")
            .with("id", 1)
            .with("public", true)
            .with("data", vec![0u8, 159, 146, 150])];
        load(&channel, catalog(), rows, &[]).await.unwrap();

        // SQLite keeps booleans as integers
        let (public, data) = channel
            .submit(|conn| {
                Box::pin(async move {
                    let row: (i64, Vec<u8>) = sqlx::query_as(
                        "SELECT CAST(public AS INTEGER), data FROM attachments WHERE id = 1",
                    )
                    .fetch_one(conn)
                    .await?;
                    Ok(row)
                })
            })
            .await
            .unwrap();
        assert_eq!(public, 1);
        assert_eq!(data, vec![0u8, 159, 146, 150]);
    }

    #[tokio::test]
    async fn test_nulls_are_inserted() {
        let channel = ExecutionChannel::open("sqlite::memory:").unwrap();
        let rows = vec![
            Row::new("parent").with("id", 1).with("name", None::<String>),
            Row::new("attachments")
                .with("id", 2)
                .with("public", None::<bool>)
                .with("data", None::<Vec<u8>>),
        ];
        let report = load(&channel, catalog(), rows, &[]).await.unwrap();
        assert_eq!(report.rows_inserted, 2);

        // NULL columns cannot be decoded through the Any driver, count them instead
        let (names, attachments) = channel
            .submit(|conn| {
                Box::pin(async move {
                    let (names,): (i64,) = sqlx::query_as(
                        "SELECT COUNT(*) FROM parent WHERE id = 1 AND name IS NULL",
                    )
                    .fetch_one(&mut *conn)
                    .await?;
                    let (attachments,): (i64,) = sqlx::query_as(
                        "SELECT COUNT(*) FROM attachments \
                         WHERE id = 2 AND public IS NULL AND data IS NULL",
                    )
                    .fetch_one(&mut *conn)
                    .await?;
                    Ok((names, attachments))
                })
            })
            .await
            .unwrap();
        assert_eq!(names, 1);
        assert_eq!(attachments, 1);
    }

    #[tokio::test]
    async fn test_null_between_bound_values() {
        let channel = ExecutionChannel::open("sqlite::memory:").unwrap();
        let rows = vec![Row::new("attachments")
            .with("id", 3)
            .with("public", None::<bool>)
            .with("data", vec![7u8])];
        load(&channel, catalog(), rows, &[]).await.unwrap();

        let data = channel
            .submit(|conn| {
                Box::pin(async move {
                    let (data,): (Vec<u8>,) = sqlx::query_as(
                        "SELECT data FROM attachments WHERE id = 3 AND public IS NULL",
                    )
                    .fetch_one(conn)
                    .await?;
                    Ok(data)
                })
            })
            .await
            .unwrap();
        assert_eq!(data, vec![7u8]);
    }

    #[tokio::test]
    async fn test_constraint_violation_names_row() {
        let channel = ExecutionChannel::open("sqlite::memory:").unwrap();
        let rows = vec![
            Row::new("parent").with("id", 1),
            Row::new("parent").with("id", 1),
        ];

        let err = load(&channel, catalog(), rows, &[]).await.unwrap_err();
        match err {
            FixtureError::Insert { table, values, .. } => {
                assert_eq!(table, "parent");
                assert_eq!(values, r#"{"id":1}"#);
            }
            other => panic!("expected insert error, got {other:?}"),
        }
    }
}
