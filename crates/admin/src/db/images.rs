//! Product image persistence.
//!
//! Rows only hold a media-relative path; the files themselves are managed by
//! [`MediaStore`](crate::services::MediaStore).

use sqlx::PgPool;

use piffy_core::{ImageId, ProductId, ProductImage};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: i32,
    product_id: i32,
    path: String,
    position: i32,
}

impl From<ImageRow> for ProductImage {
    fn from(row: ImageRow) -> Self {
        Self {
            id: ImageId::new(row.id),
            product_id: ProductId::new(row.product_id),
            path: row.path,
            position: row.position,
        }
    }
}

/// Repository for product image database operations.
pub struct ImageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ImageRepository<'a> {
    /// Create a new image repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a product's images ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, product_id: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ImageRow>(
            r"
            SELECT id, product_id, path, position
            FROM shop.product_image
            WHERE product_id = $1
            ORDER BY position, id
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Append images to the end of a product's gallery, in the given order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidReference` if the product does not exist.
    pub async fn append(
        &self,
        product_id: ProductId,
        paths: &[String],
    ) -> Result<Vec<ProductImage>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut next_position = sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM shop.product_image WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut images = Vec::with_capacity(paths.len());
        for path in paths {
            let row = sqlx::query_as::<_, ImageRow>(
                r"
                INSERT INTO shop.product_image (product_id, path, position)
                VALUES ($1, $2, $3)
                RETURNING id, product_id, path, position
                ",
            )
            .bind(product_id)
            .bind(path)
            .bind(next_position)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_write(e, "product"))?;

            images.push(row.into());
            next_position = next_position.saturating_add(1);
        }

        tx.commit().await?;
        Ok(images)
    }

    /// Delete an image row, returning it so the file can be removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image does not exist.
    pub async fn delete(&self, id: ImageId) -> Result<ProductImage, RepositoryError> {
        let row = sqlx::query_as::<_, ImageRow>(
            r"
            DELETE FROM shop.product_image
            WHERE id = $1
            RETURNING id, product_id, path, position
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Set each image's position to its index in `order`.
    ///
    /// Runs in one transaction; if any id is not one of the product's images
    /// nothing is changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidReference` naming the first foreign id.
    pub async fn reorder(
        &self,
        product_id: ProductId,
        order: &[ImageId],
    ) -> Result<Vec<ProductImage>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for (position, image_id) in order.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                RepositoryError::InvalidReference("too many images to reorder".to_string())
            })?;

            let updated = sqlx::query(
                "UPDATE shop.product_image SET position = $3 WHERE id = $1 AND product_id = $2",
            )
            .bind(image_id)
            .bind(product_id)
            .bind(position)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                return Err(RepositoryError::InvalidReference(format!(
                    "image {image_id} does not belong to product {product_id}"
                )));
            }
        }

        tx.commit().await?;
        self.list(product_id).await
    }
}
