//! Cart route handlers.
//!
//! Guests get a session cart, signed-in customers their persistent cart.
//! Mutations take form posts and answer with the updated cart.

use axum::{Form, Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use piffy_core::{
    CartSnapshot, CurrencyCode, LineKey, MinorUnits, Price, PriceError, ProductId,
    QuantityChange, VariantId,
};

use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::services::{ActiveCart, CartStore, price_line};
use crate::state::AppState;

/// One cart line for display.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub title: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub total: String,
    pub total_minor: MinorUnits,
    pub currency: CurrencyCode,
}

impl CartView {
    /// Price a snapshot for display.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] if a line cannot be priced.
    pub fn from_snapshot(
        snapshot: &CartSnapshot,
        currency: CurrencyCode,
    ) -> std::result::Result<Self, PriceError> {
        let lines = snapshot
            .lines
            .iter()
            .map(|line| {
                Ok(CartLineView {
                    product_id: line.key.product_id,
                    variant_id: line.key.variant_id,
                    title: line.title.clone(),
                    quantity: line.quantity,
                    unit_price: Price::new(line.unit_price, currency).to_string(),
                    line_total: Price::from_minor_units(line.line_total(currency)?, currency)
                        .to_string(),
                })
            })
            .collect::<std::result::Result<Vec<_>, PriceError>>()?;
        let total_minor = snapshot.total(currency)?;

        Ok(Self {
            lines,
            item_count: snapshot.item_count(),
            total: Price::from_minor_units(total_minor, currency).to_string(),
            total_minor,
            currency,
        })
    }
}

/// Cart badge count.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CartCount {
    pub count: u32,
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    /// Empty string when no variant was picked.
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<String>,
}

/// Parse an optional form id, treating an empty field as absent.
fn line_key(product_id: ProductId, variant_id: Option<&str>) -> Result<LineKey> {
    let variant_id = match variant_id.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => Some(
            raw.parse::<VariantId>()
                .map_err(|e| AppError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };
    Ok(LineKey::new(product_id, variant_id))
}

async fn view(cart: &ActiveCart, currency: CurrencyCode) -> Result<Json<CartView>> {
    let snapshot = cart.snapshot().await?;
    let view = CartView::from_snapshot(&snapshot, currency)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(view))
}

/// Show the cart.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let cart = ActiveCart::for_request(state.pool(), session, user.as_ref());
    view(&cart, state.config().stripe.currency).await
}

/// Add a product to the cart. Adding an existing line increments it.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<AddToCartForm>,
) -> Result<Json<CartView>> {
    let key = line_key(form.product_id, form.variant_id.as_deref())?;
    let quantity = form.quantity.unwrap_or(1).max(1);
    let currency = state.config().stripe.currency;

    let line = price_line(state.pool(), key, quantity, currency).await?;
    let cart = ActiveCart::for_request(state.pool(), session, user.as_ref());
    cart.add(line).await?;

    tracing::debug!(product_id = %key.product_id, quantity, "Added to cart");
    view(&cart, currency).await
}

/// Set a line's quantity; zero or less removes the line.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<UpdateCartForm>,
) -> Result<Json<CartView>> {
    let key = line_key(form.product_id, form.variant_id.as_deref())?;
    let cart = ActiveCart::for_request(state.pool(), session, user.as_ref());

    let found = cart
        .set_quantity(key, QuantityChange::from_requested(form.quantity))
        .await?;
    if !found {
        return Err(AppError::NotFound(format!(
            "cart line for product {}",
            key.product_id
        )));
    }

    view(&cart, state.config().stripe.currency).await
}

/// Remove a line.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Json<CartView>> {
    let key = line_key(form.product_id, form.variant_id.as_deref())?;
    let cart = ActiveCart::for_request(state.pool(), session, user.as_ref());

    if !cart.remove(key).await? {
        return Err(AppError::NotFound(format!(
            "cart line for product {}",
            key.product_id
        )));
    }

    view(&cart, state.config().stripe.currency).await
}

/// Number of items in the cart.
#[instrument(skip(state, session, user))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartCount>> {
    let cart = ActiveCart::for_request(state.pool(), session, user.as_ref());
    let snapshot = cart.snapshot().await?;
    Ok(Json(CartCount {
        count: snapshot.item_count(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use piffy_core::CartLine;

    use super::*;

    #[test]
    fn test_line_key_treats_empty_variant_as_absent() {
        let key = line_key(ProductId::new(1), Some("")).unwrap();
        assert_eq!(key.variant_id, None);

        let key = line_key(ProductId::new(1), Some("4")).unwrap();
        assert_eq!(key.variant_id, Some(VariantId::new(4)));

        assert!(line_key(ProductId::new(1), Some("large")).is_err());
    }

    #[test]
    fn test_cart_view_totals() {
        let snapshot = CartSnapshot::new(vec![
            CartLine {
                key: LineKey::new(ProductId::new(1), None),
                title: "Fox Print".to_string(),
                unit_price: "12.50".parse().unwrap(),
                quantity: 2,
            },
            CartLine {
                key: LineKey::new(ProductId::new(2), None),
                title: "Owl Card".to_string(),
                unit_price: "7.00".parse().unwrap(),
                quantity: 1,
            },
        ]);

        let view = CartView::from_snapshot(&snapshot, CurrencyCode::GBP).unwrap();

        assert_eq!(view.item_count, 3);
        assert_eq!(view.total, "£32.00");
        assert_eq!(view.total_minor, MinorUnits::new(3200));
        assert_eq!(view.lines[0].line_total, "£25.00");
    }

    #[test]
    fn test_update_form_accepts_negative_quantity() {
        let form: UpdateCartForm = parse_form("product_id=3&variant_id=&quantity=-1");
        assert_eq!(form.quantity, -1);
        assert_eq!(
            QuantityChange::from_requested(form.quantity),
            QuantityChange::Remove
        );
    }

    fn parse_form<T: serde::de::DeserializeOwned>(body: &str) -> T {
        use axum::extract::FromRequest;

        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        runtime
            .block_on(Form::<T>::from_request(request, &()))
            .unwrap()
            .0
    }
}
