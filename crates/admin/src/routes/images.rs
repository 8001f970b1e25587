//! Product image handlers: upload, delete, reorder.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use piffy_core::{ImageId, ProductId, ProductImage};

use crate::db::{ImageRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Multipart field carrying image files.
const IMAGES_FIELD: &str = "images";

/// Reorder body: image ids in their new order.
#[derive(Debug, Deserialize)]
pub struct ReorderForm {
    pub order: Vec<ImageId>,
}

/// Upload one or more images (multipart field `images`) to a product.
///
/// New images are appended after the existing ones in upload order.
#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<ProductImage>>)> {
    if ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("product {product_id}")));
    }

    let mut saved = Vec::new();
    let result = save_fields(&state, &mut multipart, &mut saved).await;
    if let Err(err) = result {
        state.media().remove_all(&saved).await;
        return Err(err);
    }
    if saved.is_empty() {
        return Err(AppError::BadRequest(format!(
            "no files in multipart field '{IMAGES_FIELD}'"
        )));
    }

    match ImageRepository::new(state.pool())
        .append(product_id, &saved)
        .await
    {
        Ok(images) => {
            info!(product_id = %product_id, count = images.len(), "Images uploaded");
            Ok((StatusCode::CREATED, Json(images)))
        }
        Err(err) => {
            state.media().remove_all(&saved).await;
            Err(err.into())
        }
    }
}

/// Write every `images` field to the media store, recording stored paths
/// in `saved` as they land so the caller can clean up on failure.
async fn save_fields(
    state: &AppState,
    multipart: &mut Multipart,
    saved: &mut Vec<String>,
) -> Result<()> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let path = state
            .media()
            .save_product_image(&file_name, &bytes)
            .await?;
        saved.push(path);
    }
    Ok(())
}

/// Delete an image and its file.
#[instrument(skip(state))]
pub async fn delete(State(state): State<AppState>, Path(id): Path<ImageId>) -> Result<StatusCode> {
    let image = ImageRepository::new(state.pool()).delete(id).await?;
    if let Err(err) = state.media().remove(&image.path).await {
        warn!(image_id = %id, path = %image.path, error = %err, "Image file not removed");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Set image positions to their index in the submitted order.
#[instrument(skip(state, form), fields(count = form.order.len()))]
pub async fn reorder(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(form): Json<ReorderForm>,
) -> Result<Json<Vec<ProductImage>>> {
    let images = ImageRepository::new(state.pool())
        .reorder(product_id, &form.order)
        .await?;
    Ok(Json(images))
}
