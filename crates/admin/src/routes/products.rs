//! Product management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use piffy_core::{CategoryId, DEFAULT_PRODUCT_STOCK, Product, ProductDetail, ProductId, Slug};

use crate::db::{NewProduct, ProductFilter, ProductRepository};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Product create/update body. A blank slug is derived from the title.
#[derive(Debug, Deserialize)]
pub struct ProductForm {
    pub category_id: CategoryId,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default = "default_stock")]
    pub stock: i32,
    #[serde(default)]
    pub featured: bool,
}

const fn default_stock() -> i32 {
    DEFAULT_PRODUCT_STOCK
}

impl ProductForm {
    /// Validate into repository input.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` naming the first invalid field.
    pub fn into_new_product(self) -> Result<NewProduct> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("title is required".to_string()));
        }
        if title.chars().count() > Product::MAX_TITLE_LENGTH {
            return Err(AppError::BadRequest(format!(
                "title must be at most {} characters",
                Product::MAX_TITLE_LENGTH
            )));
        }
        if self.price.is_sign_negative() {
            return Err(AppError::BadRequest("price must not be negative".to_string()));
        }
        if self.stock < 0 {
            return Err(AppError::BadRequest("stock must not be negative".to_string()));
        }
        let slug = Slug::explicit_or_derived(self.slug.as_deref(), &title)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(NewProduct {
            category_id: self.category_id,
            title,
            slug,
            description: self.description,
            price: self.price.round_dp(2),
            stock: self.stock,
            featured: self.featured,
        })
    }
}

/// Listing query.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<CategoryId>,
    pub featured: Option<bool>,
    pub q: Option<String>,
}

/// Bulk delete body.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteForm {
    pub ids: Vec<ProductId>,
}

/// Number of products removed.
#[derive(Debug, Serialize)]
pub struct DeletedCount {
    pub deleted: u64,
}

/// List products, newest first.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let filter = ProductFilter {
        category_id: query.category_id,
        featured: query.featured,
        search: query.q,
    };
    let products = ProductRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(products))
}

/// Create a product.
#[instrument(skip(state, form))]
pub async fn create(
    State(state): State<AppState>,
    Json(form): Json<ProductForm>,
) -> Result<(StatusCode, Json<Product>)> {
    let input = form.into_new_product()?;
    let product = ProductRepository::new(state.pool()).create(&input).await?;
    info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Product with images and variants.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    ProductRepository::new(state.pool())
        .get_detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Replace a product's fields.
#[instrument(skip(state, form))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(form): Json<ProductForm>,
) -> Result<Json<Product>> {
    let input = form.into_new_product()?;
    let product = ProductRepository::new(state.pool()).update(id, &input).await?;
    Ok(Json(product))
}

/// Delete a product and its image files.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    let deleted = ProductRepository::new(state.pool()).delete(id).await?;
    state.media().remove_all(&deleted.image_paths).await;
    info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Delete several products. Unknown ids are skipped.
#[instrument(skip(state, form), fields(requested = form.ids.len()))]
pub async fn bulk_delete(
    State(state): State<AppState>,
    Json(form): Json<BulkDeleteForm>,
) -> Result<Json<DeletedCount>> {
    let deleted = ProductRepository::new(state.pool())
        .delete_many(&form.ids)
        .await?;
    state.media().remove_all(&deleted.image_paths).await;
    info!(deleted = deleted.count, "Products bulk deleted");
    Ok(Json(DeletedCount {
        deleted: deleted.count,
    }))
}

/// Copy a product under `<slug>-copy`.
#[instrument(skip(state))]
pub async fn duplicate(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<(StatusCode, Json<Product>)> {
    let copy = ProductRepository::new(state.pool()).duplicate(id).await?;
    info!(product_id = %id, copy_id = %copy.id, "Product duplicated");
    Ok((StatusCode::CREATED, Json(copy)))
}
