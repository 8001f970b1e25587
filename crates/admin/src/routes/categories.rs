//! Category management handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use piffy_core::{Category, CategoryId, Slug};

use crate::db::{CategoryRepository, NewCategory};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Category create/update body. The slug always follows the name.
#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryForm {
    fn into_new_category(self) -> Result<NewCategory> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".to_string()));
        }
        if name.chars().count() > Category::MAX_NAME_LENGTH {
            return Err(AppError::BadRequest(format!(
                "name must be at most {} characters",
                Category::MAX_NAME_LENGTH
            )));
        }
        let slug = Slug::from_title(&name).map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(NewCategory {
            name,
            slug,
            description: self.description,
        })
    }
}

/// List categories by name.
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(Json(categories))
}

/// Create a category.
#[instrument(skip(state, form))]
pub async fn create(
    State(state): State<AppState>,
    Json(form): Json<CategoryForm>,
) -> Result<(StatusCode, Json<Category>)> {
    let input = form.into_new_category()?;
    let category = CategoryRepository::new(state.pool()).create(&input).await?;
    info!(category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// Rename or re-describe a category.
#[instrument(skip(state, form))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(form): Json<CategoryForm>,
) -> Result<Json<Category>> {
    let input = form.into_new_category()?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(Json(category))
}

/// Delete a category with all its products.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    let image_paths = CategoryRepository::new(state.pool()).delete(id).await?;
    state.media().remove_all(&image_paths).await;
    info!(category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_form_derives_slug() {
        let input = CategoryForm {
            name: " Art Prints ".to_string(),
            description: String::new(),
        }
        .into_new_category()
        .unwrap();

        assert_eq!(input.name, "Art Prints");
        assert_eq!(input.slug.as_str(), "art-prints");
    }

    #[test]
    fn test_category_form_rejects_long_name() {
        let form = CategoryForm {
            name: "x".repeat(Category::MAX_NAME_LENGTH + 1),
            description: String::new(),
        };
        assert!(matches!(form.into_new_category(), Err(AppError::BadRequest(_))));
    }
}
