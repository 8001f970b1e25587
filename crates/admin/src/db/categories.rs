//! Category persistence.

use sqlx::PgPool;

use piffy_core::{Category, CategoryId, Slug};

use super::RepositoryError;

/// Input for creating or updating a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: Slug,
    pub description: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    slug: String,
    description: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug: row.slug,
            description: row.description,
        }
    }
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, name, slug, description
            FROM shop.category
            ORDER BY name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name or slug is taken.
    pub async fn create(&self, input: &NewCategory) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            INSERT INTO shop.category (name, slug, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, description
            ",
        )
        .bind(&input.name)
        .bind(input.slug.as_str())
        .bind(&input.description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "category"))?;

        Ok(row.into())
    }

    /// Replace a category's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the name or slug is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &NewCategory,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            UPDATE shop.category
            SET name = $2, slug = $3, description = $4
            WHERE id = $1
            RETURNING id, name, slug, description
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.slug.as_str())
        .bind(&input.description)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "category"))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a category and, by cascade, its products.
    ///
    /// Returns the media paths of the images removed with those products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<Vec<String>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let image_paths = sqlx::query_scalar::<_, String>(
            r"
            DELETE FROM shop.product_image
            WHERE product_id IN (SELECT id FROM shop.product WHERE category_id = $1)
            RETURNING path
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM shop.category WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(image_paths)
    }
}
