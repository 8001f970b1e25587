//! Database operations for the shop `PostgreSQL` schema.
//!
//! ## Tables (schema `shop`)
//!
//! - `category`, `product`, `product_image`, `product_variant` - Catalog (read-only here)
//! - `user` - Customers that own persistent carts and orders
//! - `cart`, `cart_item` - Persistent carts for signed-in customers
//! - `order`, `order_item` - Paid orders, unique per Stripe checkout session
//!
//! Sessions (including guest carts) live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p piffy-cli -- migrate
//! ```

pub mod carts;
pub mod catalog;
pub mod orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use catalog::CatalogRepository;
pub use orders::{NewOrder, NewOrderItem, OrderRepository};

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

    /// Constraint violation (e.g., duplicate checkout session).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A value does not fit its column.
    #[error("value out of range: {0}")]
    OutOfRange(String),
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

/// Clamp a cart line quantity into the `INTEGER` column range.
pub(crate) fn quantity_to_db(quantity: u32) -> i32 {
    i32::try_from(quantity.min(piffy_core::MAX_LINE_QUANTITY)).unwrap_or(i32::MAX)
}

/// Convert a purchased quantity for `shop.order_item` without capping it.
pub(crate) fn order_quantity_to_db(quantity: u32) -> Result<i32, RepositoryError> {
    if quantity == 0 {
        return Err(RepositoryError::OutOfRange("order item quantity 0".to_string()));
    }
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::OutOfRange(format!("order item quantity {quantity}")))
}

/// Convert a non-negative database integer into a `u32` quantity.
pub(crate) fn quantity_from_db(value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative quantity {value}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_quantity_is_capped() {
        assert_eq!(quantity_to_db(5), 5);
        assert_eq!(
            quantity_to_db(u32::MAX),
            i32::try_from(piffy_core::MAX_LINE_QUANTITY).unwrap()
        );
    }

    #[test]
    fn test_order_quantity_is_stored_as_charged() {
        assert_eq!(order_quantity_to_db(1500).unwrap(), 1500);
        assert!(matches!(
            order_quantity_to_db(u32::MAX),
            Err(RepositoryError::OutOfRange(_))
        ));
        assert!(matches!(
            order_quantity_to_db(0),
            Err(RepositoryError::OutOfRange(_))
        ));
    }
}
