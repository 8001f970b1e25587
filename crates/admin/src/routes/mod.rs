//! HTTP route handlers for admin.
//!
//! Everything under `/manage` requires `Authorization: Bearer <token>`.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                - Liveness check
//! GET  /health/ready                          - Readiness check (database)
//!
//! # Products
//! GET    /manage/products                     - List (?category_id, ?featured, ?q)
//! POST   /manage/products                     - Create (slug from title if blank)
//! POST   /manage/products/bulk-delete         - Delete by id list
//! GET    /manage/products/{id}                - Detail with images and variants
//! PUT    /manage/products/{id}                - Update
//! DELETE /manage/products/{id}                - Delete
//! POST   /manage/products/{id}/duplicate      - Copy as <slug>-copy
//!
//! # Images
//! POST   /manage/products/{id}/images         - Multipart upload (field `images`)
//! PUT    /manage/products/{id}/images/order   - Reorder (position = index)
//! DELETE /manage/images/{id}                  - Delete
//!
//! # Variants
//! POST   /manage/products/{id}/variants       - Create
//! PUT    /manage/variants/{id}                - Update
//! DELETE /manage/variants/{id}                - Delete
//!
//! # Categories
//! GET    /manage/categories                   - List
//! POST   /manage/categories                   - Create
//! PUT    /manage/categories/{id}              - Update
//! DELETE /manage/categories/{id}              - Delete (cascades to products)
//!
//! # Orders
//! GET    /manage/orders                       - List newest first (?status)
//! GET    /manage/orders/{id}                  - Detail with items
//! PUT    /manage/orders/{id}/status           - Status update
//! ```

pub mod categories;
pub mod images;
pub mod orders;
pub mod products;
pub mod variants;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

use crate::middleware::require_bearer_token;
use crate::state::AppState;

/// Create the product, image and variant routes router.
pub fn product_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route("/bulk-delete", post(products::bulk_delete))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/{id}/duplicate", post(products::duplicate))
        .route(
            "/{id}/images",
            post(images::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/{id}/images/order", put(images::reorder))
        .route("/{id}/variants", post(variants::create))
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::list).post(categories::create))
        .route("/{id}", put(categories::update).delete(categories::delete))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", put(orders::update_status))
}

/// Create all `/manage` routes behind the bearer token check.
pub fn routes(state: &AppState) -> Router<AppState> {
    let manage = Router::new()
        .nest("/products", product_routes(state.config().max_upload_bytes))
        .route("/images/{id}", delete(images::delete))
        .route(
            "/variants/{id}",
            put(variants::update).delete(variants::delete),
        )
        .nest("/categories", category_routes())
        .nest("/orders", order_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_bearer_token,
        ));

    Router::new().nest("/manage", manage)
}
