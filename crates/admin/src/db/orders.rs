//! Order reads and status updates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use piffy_core::{
    MinorUnits, Order, OrderId, OrderItem, OrderItemId, OrderStatus, OrderWithItems, ProductId,
    ShippingAddress, UserId, VariantId,
};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    email: Option<String>,
    total_price: Decimal,
    stripe_session_id: String,
    stripe_payment_intent: Option<String>,
    shipping_name: Option<String>,
    shipping_address1: Option<String>,
    shipping_address2: Option<String>,
    shipping_city: Option<String>,
    shipping_postcode: Option<String>,
    shipping_country: Option<String>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            email: row.email,
            total_price: row.total_price,
            stripe_session_id: row.stripe_session_id,
            stripe_payment_intent: row.stripe_payment_intent,
            shipping: ShippingAddress {
                name: row.shipping_name,
                line1: row.shipping_address1,
                line2: row.shipping_address2,
                city: row.shipping_city,
                postal_code: row.shipping_postcode,
                country: row.shipping_country,
            },
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: Option<i32>,
    variant_id: Option<i32>,
    title: String,
    quantity: i32,
    unit_amount: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: row.product_id.map(ProductId::new),
            variant_id: row.variant_id.map(VariantId::new),
            title: row.title,
            quantity: row.quantity,
            unit_amount: MinorUnits::new(row.unit_amount),
        }
    }
}

const ORDER_COLUMNS: &str = "id, user_id, email, total_price, stripe_session_id, \
                             stripe_payment_intent, shipping_name, shipping_address1, \
                             shipping_address2, shipping_city, shipping_postcode, \
                             shipping_country, status, created_at";

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders newest first, optionally only those in one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM shop.order
            WHERE ($1::shop.order_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_items(
        &self,
        id: OrderId,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, variant_id, title, quantity, unit_amount
            FROM shop.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(OrderWithItems {
            order: row.into(),
            items: items.into_iter().map(Into::into).collect(),
        }))
    }

    /// Set an order's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE shop.order SET status = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }
}
