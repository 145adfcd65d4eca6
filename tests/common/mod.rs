// common/mod.rs - Shared test utilities for fixture loading tests
//
// Every test gets its own in-memory database, so tests never see each
// other's tables and can run in parallel.

#![allow(dead_code)]

use std::sync::Arc;

use fixture_db::{Catalog, ColumnDef, RealDatabase, TableDef, TestDbConfig};

/// parent <- child <- grandchild, plus an unrelated table
pub fn family_catalog() -> Arc<Catalog> {
    let catalog = Catalog::new(vec![
        TableDef::new("grandchild")
            .column(ColumnDef::integer("id").primary_key())
            .column(ColumnDef::integer("child_id").not_null())
            .foreign_key("child_id", "child", "id"),
        TableDef::new("child")
            .column(ColumnDef::integer("id").primary_key())
            .column(ColumnDef::integer("parent_id").not_null())
            .column(ColumnDef::text("name"))
            .foreign_key("parent_id", "parent", "id"),
        TableDef::new("parent")
            .column(ColumnDef::integer("id").primary_key())
            .column(ColumnDef::text("name")),
        TableDef::new("settings")
            .column(ColumnDef::text("key").primary_key())
            .column(ColumnDef::text("value")),
    ])
    .expect("family catalog is valid");

    Arc::new(catalog)
}

/// A fresh, cleaned in-memory database for `catalog`
pub async fn memory_db(catalog: Arc<Catalog>) -> RealDatabase {
    fixture_db::init_tracing();
    RealDatabase::set_up(catalog, &TestDbConfig::memory(), true)
        .await
        .expect("Failed to set up test database")
}

/// Number of rows in `table`
pub async fn count_rows(db: &RealDatabase, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM \"{}\"", table);
    db.channel()
        .expect("database has a pool")
        .submit(move |conn| {
            Box::pin(async move {
                let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(conn).await?;
                Ok(count)
            })
        })
        .await
        .expect("count query failed")
}

/// Run raw SQL statements on the test database, bypassing the catalog
pub async fn execute_raw(db: &RealDatabase, statements: &[&str]) {
    let statements: Vec<String> = statements.iter().map(|s| s.to_string()).collect();
    db.channel()
        .expect("database has a pool")
        .submit(move |conn| {
            Box::pin(async move {
                for sql in &statements {
                    sqlx::query(sql).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .await
        .expect("raw statement failed");
}
