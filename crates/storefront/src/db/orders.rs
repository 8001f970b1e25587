//! Order persistence.
//!
//! Orders are written once per Stripe checkout session. The unique index on
//! `stripe_session_id` plus `ON CONFLICT DO NOTHING` makes concurrent webhook
//! deliveries race-free: exactly one transaction inserts the order and the
//! others observe a duplicate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use piffy_core::{
    MinorUnits, Order, OrderId, OrderItem, OrderItemId, OrderStatus, OrderWithItems, ProductId,
    ShippingAddress, UserId, VariantId,
};

use super::{RepositoryError, order_quantity_to_db};

/// Input for creating an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub email: Option<String>,
    pub total_price: Decimal,
    pub stripe_session_id: String,
    pub stripe_payment_intent: Option<String>,
    pub shipping: ShippingAddress,
}

/// Input for one order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub title: String,
    pub quantity: u32,
    pub unit_amount: MinorUnits,
}

// =============================================================================
// Internal Row Types
// =============================================================================

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

// =============================================================================
// Repository
// =============================================================================

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

    /// Find the order paid for by a checkout session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE stripe_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Find an order and its items by checkout session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn find_with_items_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let Some(order) = self.find_by_session_id(session_id).await? else {
            return Ok(None);
        };
        let items = self.items(order.id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// List an order's items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, variant_id, title, quantity, unit_amount
            FROM shop.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert an order and its items in one transaction.
    ///
    /// Returns `Ok(None)` without writing anything if an order for the same
    /// checkout session already exists. A `user_id` that no longer matches a
    /// customer is stored as NULL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// committed in that case.
    pub async fn create_with_items(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO shop.order (
                user_id, email, total_price, stripe_session_id, stripe_payment_intent,
                shipping_name, shipping_address1, shipping_address2,
                shipping_city, shipping_postcode, shipping_country
            )
            VALUES (
                (SELECT id FROM shop.user WHERE id = $1),
                $2, $3, $4, $5, $6, $7, $8, $9, $10, $11
            )
            ON CONFLICT (stripe_session_id) DO NOTHING
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(order.email.as_deref())
        .bind(order.total_price)
        .bind(&order.stripe_session_id)
        .bind(order.stripe_payment_intent.as_deref())
        .bind(order.shipping.name.as_deref())
        .bind(order.shipping.line1.as_deref())
        .bind(order.shipping.line2.as_deref())
        .bind(order.shipping.city.as_deref())
        .bind(order.shipping.postal_code.as_deref())
        .bind(order.shipping.country.as_deref())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let created: Order = row.into();

        let mut created_items = Vec::with_capacity(items.len());
        for item in items {
            let quantity = order_quantity_to_db(item.quantity)?;
            let row = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO shop.order_item (
                    order_id, product_id, variant_id, title, quantity, unit_amount
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, order_id, product_id, variant_id, title, quantity, unit_amount
                ",
            )
            .bind(created.id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(&item.title)
            .bind(quantity)
            .bind(item.unit_amount.get())
            .fetch_one(&mut *tx)
            .await?;
            created_items.push(OrderItem::from(row));
        }

        tx.commit().await?;
        Ok(Some(OrderWithItems {
            order: created,
            items: created_items,
        }))
    }
}
