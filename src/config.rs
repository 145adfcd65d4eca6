// config.rs - Which database the harness talks to
//
// By default every test session gets a private in-memory SQLite database.
// Setting TEST_DB_URL (in the environment or a .env file) points the harness
// at an external database instead. The harness is careful to clean out *all*
// tables in that database before and after each test, so never aim it at
// anything that holds data you care about.

use std::env;

use crate::error::Result;
use crate::schema::Dialect;

/// Environment variable selecting an external test database
pub const TEST_DB_URL_VAR: &str = "TEST_DB_URL";

/// URL of the default ephemeral store
pub const MEMORY_URL: &str = "sqlite::memory:";

/// The resolved test-database target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDbConfig {
    url: String,
}

impl TestDbConfig {
    /// Read TEST_DB_URL (loading .env first), falling back to in-memory SQLite
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::resolve(env::var(TEST_DB_URL_VAR).ok())
    }

    /// Resolve an optional override; blank values count as absent
    pub fn resolve(url_override: Option<String>) -> Self {
        match url_override {
            Some(url) if !url.trim().is_empty() => Self::with_url(url.trim()),
            _ => Self::memory(),
        }
    }

    pub fn memory() -> Self {
        Self {
            url: MEMORY_URL.to_string(),
        }
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_memory(&self) -> bool {
        self.url == MEMORY_URL
    }

    /// SQL dialect for this target; errors for drivers we cannot speak
    pub fn dialect(&self) -> Result<Dialect> {
        Dialect::from_url(&self.url)
    }
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self::memory()
    }
}
