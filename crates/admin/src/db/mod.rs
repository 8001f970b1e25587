//! Database operations for the back-office.
//!
//! Admin shares the shop `PostgreSQL` schema with the storefront and is the
//! only writer of catalog tables (`category`, `product`, `product_image`,
//! `product_variant`). Orders are written by the storefront webhook; admin
//! only reads them and moves their status along.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p piffy-cli -- migrate
//! ```

pub mod categories;
pub mod images;
pub mod orders;
pub mod products;
pub mod variants;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use categories::{CategoryRepository, NewCategory};
pub use images::ImageRepository;
pub use orders::OrderRepository;
pub use products::{DeletedProducts, NewProduct, ProductFilter, ProductRepository};
pub use variants::{NewVariant, VariantRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A referenced row (category, product) does not exist.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

impl RepositoryError {
    /// Classify a write error, turning constraint violations into
    /// client-facing variants.
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::Conflict(format!("{what} already exists"));
            }
            if db_err.is_foreign_key_violation() {
                return Self::InvalidReference(what.to_string());
            }
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
