//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Catalog
//! GET  /products               - Product listing, newest first
//! GET  /products/{slug}        - Product with images and variants
//! GET  /categories             - Category listing
//!
//! # Cart
//! GET  /cart                   - Cart contents and total
//! POST /cart/add               - Add a product (or variant)
//! POST /cart/update            - Set a line's quantity (<= 0 removes)
//! POST /cart/remove            - Remove a line
//! GET  /cart/count             - Item count
//!
//! # Checkout
//! POST /checkout               - Redirect to Stripe Checkout
//! GET  /checkout/success       - Landing after payment
//! GET  /checkout/cancel        - Landing after a cancelled payment
//!
//! # Webhooks
//! POST /webhooks/stripe        - Signed Stripe events
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::state::AppState;

/// Largest webhook body accepted.
const WEBHOOK_BODY_LIMIT: usize = 256 * 1024;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::products))
        .route("/{slug}", get(catalog::product))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::start))
        .route("/success", get(checkout::success))
        .route("/cancel", get(checkout::cancel))
}

/// Create the webhook routes router.
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/stripe", post(webhook::stripe))
        .layer(RequestBodyLimitLayer::new(WEBHOOK_BODY_LIMIT))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .route("/categories", get(catalog::categories))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/webhooks", webhook_routes())
}
