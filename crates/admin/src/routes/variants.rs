//! Variant management handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use piffy_core::{ProductId, ProductVariant, VariantId};

use crate::db::{NewVariant, VariantRepository};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Variant create/update body.
#[derive(Debug, Deserialize)]
pub struct VariantForm {
    pub name: String,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub price_adjust: Decimal,
}

impl VariantForm {
    fn into_new_variant(self) -> Result<NewVariant> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".to_string()));
        }
        if name.chars().count() > ProductVariant::MAX_NAME_LENGTH {
            return Err(AppError::BadRequest(format!(
                "name must be at most {} characters",
                ProductVariant::MAX_NAME_LENGTH
            )));
        }
        if self.stock < 0 {
            return Err(AppError::BadRequest("stock must not be negative".to_string()));
        }

        Ok(NewVariant {
            name,
            stock: self.stock,
            price_adjust: self.price_adjust.round_dp(2),
        })
    }
}

/// Add a variant to a product.
#[instrument(skip(state, form))]
pub async fn create(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(form): Json<VariantForm>,
) -> Result<(StatusCode, Json<ProductVariant>)> {
    let input = form.into_new_variant()?;
    let variant = VariantRepository::new(state.pool())
        .create(product_id, &input)
        .await?;
    info!(product_id = %product_id, variant_id = %variant.id, "Variant created");
    Ok((StatusCode::CREATED, Json(variant)))
}

/// Replace a variant's fields.
#[instrument(skip(state, form))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<VariantId>,
    Json(form): Json<VariantForm>,
) -> Result<Json<ProductVariant>> {
    let input = form.into_new_variant()?;
    let variant = VariantRepository::new(state.pool()).update(id, &input).await?;
    Ok(Json(variant))
}

/// Delete a variant.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<VariantId>,
) -> Result<StatusCode> {
    VariantRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_form_allows_negative_adjustment() {
        let form: VariantForm =
            serde_json::from_str(r#"{"name": "Unframed", "stock": 4, "price_adjust": "-2.50"}"#)
                .unwrap();
        let input = form.into_new_variant().unwrap();
        assert_eq!(input.price_adjust, "-2.50".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_variant_form_rejects_negative_stock() {
        let form: VariantForm = serde_json::from_str(r#"{"name": "A3", "stock": -1}"#).unwrap();
        assert!(matches!(form.into_new_variant(), Err(AppError::BadRequest(_))));
    }
}
