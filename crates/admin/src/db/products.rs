//! Product persistence.
//!
//! Deleting products cascades to their images, variants and cart lines in
//! the database. The image files on disk are not covered by the cascade, so
//! deletes hand back the stored paths for the caller to remove.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use piffy_core::{Category, CategoryId, Product, ProductDetail, ProductId, Slug};

use super::{ImageRepository, RepositoryError, VariantRepository};

/// Input for creating or updating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub category_id: CategoryId,
    pub title: String,
    pub slug: Slug,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub featured: bool,
}

/// Listing filters. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub featured: Option<bool>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
}

/// Result of deleting one or more products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedProducts {
    pub count: u64,
    /// Media paths of the images that went with them.
    pub image_paths: Vec<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    category_id: i32,
    title: String,
    slug: String,
    description: String,
    price: Decimal,
    stock: i32,
    featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            category_id: CategoryId::new(row.category_id),
            title: row.title,
            slug: row.slug,
            description: row.description,
            price: row.price,
            stock: row.stock,
            featured: row.featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    slug: String,
    description: String,
}

const PRODUCT_COLUMNS: &str = "id, category_id, title, slug, description, price, stock, \
                               featured, created_at, updated_at";

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.product
            WHERE ($1::INTEGER IS NULL OR category_id = $1)
              AND ($2::BOOLEAN IS NULL OR featured = $2)
              AND ($3::TEXT IS NULL
                   OR title ILIKE '%' || $3 || '%'
                   OR description ILIKE '%' || $3 || '%')
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(filter.category_id)
        .bind(filter.featured)
        .bind(search)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a product with its category, images (by position) and variants (by name).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if the product's category is missing.
    pub async fn get_detail(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let Some(product) = self.get(id).await? else {
            return Ok(None);
        };

        let category = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, description FROM shop.category WHERE id = $1",
        )
        .bind(product.category_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "product {} references missing category {}",
                product.id, product.category_id
            ))
        })?;

        let images = ImageRepository::new(self.pool).list(product.id).await?;
        let variants = VariantRepository::new(self.pool).list(product.id).await?;

        Ok(Some(ProductDetail {
            product,
            category: Category {
                id: CategoryId::new(category.id),
                name: category.name,
                slug: category.slug,
                description: category.description,
            },
            images,
            variants,
        }))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    /// Returns `RepositoryError::InvalidReference` if the category does not exist.
    pub async fn create(&self, input: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.product (category_id, title, slug, description, price, stock, featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(input.category_id)
        .bind(&input.title)
        .bind(input.slug.as_str())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.featured)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product"))?;

        Ok(row.into())
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(&self, id: ProductId, input: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product
            SET category_id = $2, title = $3, slug = $4, description = $5,
                price = $6, stock = $7, featured = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.category_id)
        .bind(&input.title)
        .bind(input.slug.as_str())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.featured)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product"))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Copy a product's fields under the slug `<slug>-copy`.
    ///
    /// Images and variants are not copied.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the copy's slug is taken.
    pub async fn duplicate(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let original = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        let slug = Slug::parse(&original.slug)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?
            .copy_of();

        self.create(&NewProduct {
            category_id: original.category_id,
            title: original.title,
            slug,
            description: original.description,
            price: original.price,
            stock: original.stock,
            featured: original.featured,
        })
        .await
    }

    /// Delete one product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<DeletedProducts, RepositoryError> {
        let deleted = self.delete_many(&[id]).await?;
        if deleted.count == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(deleted)
    }

    /// Delete every listed product that exists. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn delete_many(&self, ids: &[ProductId]) -> Result<DeletedProducts, RepositoryError> {
        if ids.is_empty() {
            return Ok(DeletedProducts::default());
        }
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        let mut tx = self.pool.begin().await?;

        let image_paths = sqlx::query_scalar::<_, String>(
            "DELETE FROM shop.product_image WHERE product_id = ANY($1) RETURNING path",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let count = sqlx::query("DELETE FROM shop.product WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(DeletedProducts { count, image_paths })
    }
}
