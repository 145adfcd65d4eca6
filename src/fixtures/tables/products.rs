// fixtures/tables/products.rs
//
// A small e-commerce schema: categories, products that belong to a category,
// reviews of products, and a tag table that tests create but usually leave
// empty. Tables are declared leaf-first on purpose so the catalog has to
// sort them.

use crate::error::Result;
use crate::fixtures::{Fixture, Row};
use crate::schema::{Catalog, ColumnDef, TableDef};

/// The products schema
pub fn products_catalog() -> Result<Catalog> {
    Catalog::new(vec![
        TableDef::new("reviews")
            .column(ColumnDef::integer("id").primary_key())
            .column(ColumnDef::integer("product_id").not_null())
            .column(ColumnDef::integer("stars").not_null())
            .column(ColumnDef::text("body"))
            .foreign_key("product_id", "products", "id"),
        TableDef::new("product_tags")
            .column(ColumnDef::integer("product_id").primary_key())
            .column(ColumnDef::text("tag").primary_key())
            .foreign_key("product_id", "products", "id"),
        TableDef::new("products")
            .column(ColumnDef::integer("id").primary_key())
            .column(ColumnDef::text("name").not_null())
            .column(ColumnDef::text("description").not_null())
            .column(ColumnDef::integer("category_id").not_null())
            .column(ColumnDef::integer("price_cents").not_null())
            .column(ColumnDef::boolean("in_stock").not_null())
            .column(ColumnDef::blob("thumbnail"))
            .foreign_key("category_id", "categories", "id"),
        TableDef::new("categories")
            .column(ColumnDef::integer("id").primary_key())
            .column(ColumnDef::text("name").not_null()),
    ])
}

fn product(id: i64, name: &str, description: &str, category_id: i64, price_cents: i64) -> Row {
    Row::new("products")
        .with("id", id)
        .with("name", name)
        .with("description", description)
        .with("category_id", category_id)
        .with("price_cents", price_cents)
        .with("in_stock", true)
}

fn review(id: i64, product_id: i64, stars: i64, body: Option<&str>) -> Row {
    Row::new("reviews")
        .with("id", id)
        .with("product_id", product_id)
        .with("stars", stars)
        .with("body", body)
}

/// Three categories, six products, four reviews; tags table created empty
pub struct ProductsFixture;

impl Fixture for ProductsFixture {
    fn rows() -> Vec<Row> {
        // Reviews first: insertion order must come from the catalog, not from here
        vec![
            review(1, 1, 5, Some("Great noise cancellation")),
            review(2, 1, 4, None),
            review(3, 4, 5, Some("Best mouse I have owned")),
            review(4, 6, 3, Some("Comfortable, but squeaks")),
            product(
                1,
                "Wireless Headphones",
                "High-quality wireless headphones with noise cancellation and 30-hour battery life",
                1,
                7999,
            )
            .with("thumbnail", vec![0x89u8, 0x50, 0x4e, 0x47]),
            product(
                2,
                "USB-C Cable",
                "Fast charging USB-C cable, durable braided design",
                2,
                1299,
            ),
            product(
                3,
                "Mechanical Keyboard",
                "Mechanical keyboard with RGB lighting and customizable keys",
                1,
                8999,
            ),
            product(
                4,
                "Gaming Mouse Pro",
                "Professional gaming mouse with high DPI sensor and programmable buttons",
                1,
                5999,
            ),
            product(
                5,
                "Standard Mouse",
                "Basic optical mouse, good for office work",
                1,
                1999,
            )
            .with("in_stock", false),
            product(
                6,
                "Ergonomic Office Chair",
                "Comfortable office chair with lumbar support and adjustable height",
                3,
                19999,
            ),
            Row::new("categories").with("id", 1).with("name", "Electronics"),
            Row::new("categories").with("id", 2).with("name", "Accessories"),
            Row::new("categories").with("id", 3).with("name", "Furniture"),
        ]
    }

    fn extra_tables() -> &'static [&'static str] {
        &["product_tags"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_products_catalog_order() {
        let catalog = products_catalog().unwrap();
        let names: Vec<&str> = catalog.all_tables().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["categories", "products", "reviews", "product_tags"]);
    }

    #[test]
    fn test_fixture_only_names_catalog_tables() {
        let catalog = products_catalog().unwrap();
        let rows = ProductsFixture::rows();
        assert_eq!(rows.len(), 13);
        assert!(rows.iter().all(|r| catalog.contains(&r.table)));
        assert!(ProductsFixture::extra_tables()
            .iter()
            .all(|t| catalog.contains(t)));
    }
}
