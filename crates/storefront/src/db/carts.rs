//! Persistent carts for signed-in customers.
//!
//! Each customer has at most one `shop.cart` row. Lines are unique per
//! product and variant, and prices are always read live from the catalog.

use rust_decimal::Decimal;
use sqlx::PgPool;

use piffy_core::{CartLine, LineKey, MAX_LINE_QUANTITY, ProductId, UserId, VariantId};

use super::{RepositoryError, quantity_from_db, quantity_to_db};

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: i32,
    variant_id: Option<i32>,
    title: String,
    unit_price: Decimal,
    quantity: i32,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            key: LineKey::new(
                ProductId::new(row.product_id),
                row.variant_id.map(VariantId::new),
            ),
            title: row.title,
            unit_price: row.unit_price,
            quantity: quantity_from_db(row.quantity)?,
        })
    }
}

/// Repository for persistent cart operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the customer's cart lines with live titles and prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.product_id,
                   ci.variant_id,
                   CASE WHEN v.id IS NULL THEN p.title
                        ELSE p.title || ' - ' || v.name END AS title,
                   p.price + COALESCE(v.price_adjust, 0) AS unit_price,
                   ci.quantity
            FROM shop.cart c
            JOIN shop.cart_item ci ON ci.cart_id = c.id
            JOIN shop.product p ON p.id = ci.product_id
            LEFT JOIN shop.product_variant v ON v.id = ci.variant_id
            WHERE c.user_id = $1
            ORDER BY ci.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    /// Add `quantity` of a line, creating the cart on first use and merging
    /// into an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn add(
        &self,
        user_id: UserId,
        key: LineKey,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let quantity = quantity_to_db(quantity);
        let max = quantity_to_db(MAX_LINE_QUANTITY);

        let mut tx = self.pool.begin().await?;

        let (cart_id,): (i32,) = sqlx::query_as(
            r"
            INSERT INTO shop.cart (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO shop.cart_item (cart_id, product_id, variant_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id, (COALESCE(variant_id, 0)))
            DO UPDATE SET quantity = LEAST(shop.cart_item.quantity + EXCLUDED.quantity, $5)
            ",
        )
        .bind(cart_id)
        .bind(key.product_id)
        .bind(key.variant_id)
        .bind(quantity)
        .bind(max)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Replace a line's quantity; zero deletes the line. Returns `false` if
    /// the line does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        key: LineKey,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        if quantity == 0 {
            return self.remove(user_id, key).await;
        }
        let quantity = quantity_to_db(quantity);

        let result = sqlx::query(
            r"
            UPDATE shop.cart_item ci
            SET quantity = $4
            FROM shop.cart c
            WHERE ci.cart_id = c.id
              AND c.user_id = $1
              AND ci.product_id = $2
              AND ci.variant_id IS NOT DISTINCT FROM $3
            ",
        )
        .bind(user_id)
        .bind(key.product_id)
        .bind(key.variant_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a line. Returns `false` if the line does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, key: LineKey) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM shop.cart_item ci
            USING shop.cart c
            WHERE ci.cart_id = c.id
              AND c.user_id = $1
              AND ci.product_id = $2
              AND ci.variant_id IS NOT DISTINCT FROM $3
            ",
        )
        .bind(user_id)
        .bind(key.product_id)
        .bind(key.variant_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the customer's cart and all its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
