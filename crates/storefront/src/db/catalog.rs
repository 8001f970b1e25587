//! Read-only catalog queries for the public shop.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use piffy_core::{
    Category, CategoryId, ImageId, Product, ProductDetail, ProductId, ProductImage,
    ProductVariant, VariantId,
};

use super::RepositoryError;

// =============================================================================
// Internal Row Types
// =============================================================================

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

const PRODUCT_COLUMNS: &str = "id, category_id, title, slug, description, price, stock, \
                               featured, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Find the oldest product with exactly this title.
    ///
    /// Titles are not unique; this is only used to correlate payment line
    /// items that arrive without product metadata.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_product_by_title(
        &self,
        title: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE title = $1 ORDER BY id LIMIT 1"
        ))
        .bind(title)
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
    pub async fn get_product_detail(
        &self,
        slug: &str,
    ) -> Result<Option<ProductDetail>, RepositoryError> {
        let Some(product) = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        .map(Product::from) else {
            return Ok(None);
        };

        let category = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, name, slug, description
            FROM shop.category
            WHERE id = $1
            ",
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

        let images = self.list_images(product.id).await?;
        let variants = self.list_variants(product.id).await?;

        Ok(Some(ProductDetail {
            product,
            category: category.into(),
            images,
            variants,
        }))
    }

    /// List a product's images ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_images(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductImage>, RepositoryError> {
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

    /// List a product's variants ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_variants(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
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

    /// Get a variant, checking it belongs to the given product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_variant(
        &self,
        product_id: ProductId,
        variant_id: VariantId,
    ) -> Result<Option<ProductVariant>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, product_id, name, stock, price_adjust
            FROM shop.product_variant
            WHERE id = $1 AND product_id = $2
            ",
        )
        .bind(variant_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List all categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
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
}
