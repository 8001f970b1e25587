//! Public catalog route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use piffy_core::{Category, Product, ProductDetail};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// List all products, newest first.
#[instrument(skip(state))]
pub async fn products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = CatalogRepository::new(state.pool()).list_products().await?;
    Ok(Json(products))
}

/// Product detail with images (by position) and variants (by name).
#[instrument(skip(state), fields(slug = %slug))]
pub async fn product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    CatalogRepository::new(state.pool())
        .get_product_detail(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))
}

/// List all categories by name.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = CatalogRepository::new(state.pool())
        .list_categories()
        .await?;
    Ok(Json(categories))
}
