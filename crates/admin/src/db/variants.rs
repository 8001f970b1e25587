//! Product variant persistence.

use rust_decimal::Decimal;
use sqlx::PgPool;

use piffy_core::{ProductId, ProductVariant, VariantId};

use super::RepositoryError;

/// Input for creating or updating a variant.
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub name: String,
    pub stock: i32,
    pub price_adjust: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i32,
    product_id: i32,
    name: String,
    stock: i32,
    price_adjust: Decimal,
}

impl From<VariantRow> for ProductVariant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: VariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            name: row.name,
            stock: row.stock,
            price_adjust: row.price_adjust,
        }
    }
}

/// Repository for variant database operations.
pub struct VariantRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VariantRepository<'a> {
    /// Create a new variant repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a product's variants ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, product_id: ProductId) -> Result<Vec<ProductVariant>, RepositoryError> {
        let rows = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, product_id, name, stock, price_adjust
            FROM shop.product_variant
            WHERE product_id = $1
            ORDER BY name
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add a variant to a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidReference` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the product already has a variant
    /// with this name.
    pub async fn create(
        &self,
        product_id: ProductId,
        input: &NewVariant,
    ) -> Result<ProductVariant, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(
            r"
            INSERT INTO shop.product_variant (product_id, name, stock, price_adjust)
            VALUES ($1, $2, $3, $4)
            RETURNING id, product_id, name, stock, price_adjust
            ",
        )
        .bind(product_id)
        .bind(&input.name)
        .bind(input.stock)
        .bind(input.price_adjust)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "variant"))?;

        Ok(row.into())
    }

    /// Replace a variant's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    pub async fn update(
        &self,
        id: VariantId,
        input: &NewVariant,
    ) -> Result<ProductVariant, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(
            r"
            UPDATE shop.product_variant
            SET name = $2, stock = $3, price_adjust = $4
            WHERE id = $1
            RETURNING id, product_id, name, stock, price_adjust
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.stock)
        .bind(input.price_adjust)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "variant"))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a variant. Cart lines holding it go with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    pub async fn delete(&self, id: VariantId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product_variant WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
