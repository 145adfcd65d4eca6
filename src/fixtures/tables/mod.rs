// fixtures/tables/mod.rs
//
// Ready-made catalogs with matching fixtures. Each submodule defines a small
// schema and a `Fixture` that seeds it, so tests can share one realistic
// data set instead of rebuilding rows by hand.

pub mod products;

pub use products::{ProductsFixture, products_catalog};
