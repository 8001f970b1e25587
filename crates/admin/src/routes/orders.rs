//! Order handlers: list, detail, status update.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, instrument};

use piffy_core::{Order, OrderId, OrderStatus, OrderWithItems};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Listing query.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
}

/// Status update body.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.trim()
        .parse::<OrderStatus>()
        .map_err(AppError::BadRequest)
}

/// List orders newest first.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<Order>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_status)
        .transpose()?;
    let orders = OrderRepository::new(state.pool()).list(status).await?;
    Ok(Json(orders))
}

/// Order with its items.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>> {
    OrderRepository::new(state.pool())
        .get_with_items(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// Move an order to another status.
#[instrument(skip(state, form), fields(status = %form.status))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(form): Json<StatusForm>,
) -> Result<Json<Order>> {
    let status = parse_status(&form.status)?;
    let order = OrderRepository::new(state.pool())
        .update_status(id, status)
        .await?;
    info!(order_id = %id, status = %status, "Order status updated");
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("shipped").unwrap(), OrderStatus::Shipped);
        assert_eq!(parse_status(" delivered ").unwrap(), OrderStatus::Delivered);
        assert!(matches!(parse_status("refunded"), Err(AppError::BadRequest(_))));
    }
}
