//! Checkout route handlers.
//!
//! `POST /checkout` redirects to Stripe. The customer comes back to
//! `/checkout/success` or `/checkout/cancel`; the order itself is created by
//! the webhook, which may arrive before or after the success landing.

use axum::{
    Json,
    extract::{Query, State},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use piffy_core::OrderWithItems;

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::session_keys;
use crate::services::{ActiveCart, CartStore, SessionCart, checkout};
use crate::state::AppState;

/// Start a Stripe Checkout session for the current cart.
///
/// Guests have the issued session id remembered so the success landing can
/// clear their cart.
#[instrument(skip(state, session, user))]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Redirect> {
    let cart = ActiveCart::for_request(state.pool(), session.clone(), user.as_ref());

    let redirect =
        checkout::initiate(&cart, state.stripe(), user.as_ref(), state.checkout()).await?;

    if cart.is_guest() {
        session
            .insert(session_keys::PENDING_CHECKOUT, &redirect.session_id)
            .await?;
    }

    Ok(Redirect::to(&redirect.url))
}

/// Success landing query.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// State of the order behind a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    /// The webhook has created the order.
    Confirmed,
    /// Payment went through but the webhook has not arrived yet.
    Processing,
    /// The customer backed out of the payment page.
    Cancelled,
}

/// Landing response.
#[derive(Debug, Serialize)]
pub struct CheckoutLanding {
    pub status: CheckoutStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderWithItems>,
    pub message: &'static str,
}

/// Landing after payment.
#[instrument(skip(state, session, query))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<CheckoutLanding>> {
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return Ok(Json(CheckoutLanding {
            status: CheckoutStatus::Processing,
            order: None,
            message: "Thank you! Your payment is being processed.",
        }));
    };

    let pending = session
        .get::<String>(session_keys::PENDING_CHECKOUT)
        .await?;
    if pending.as_deref() == Some(session_id.as_str()) {
        SessionCart::new(session.clone()).clear().await?;
        session
            .remove::<String>(session_keys::PENDING_CHECKOUT)
            .await?;
        info!(session_id = %session_id, "Guest cart cleared after checkout");
    }

    let order = OrderRepository::new(state.pool())
        .find_with_items_by_session_id(&session_id)
        .await?;

    let landing = match order {
        Some(order) => CheckoutLanding {
            status: CheckoutStatus::Confirmed,
            order: Some(order),
            message: "Thank you! Your order is confirmed.",
        },
        None => CheckoutLanding {
            status: CheckoutStatus::Processing,
            order: None,
            message: "Thank you! Your payment is being processed.",
        },
    };

    Ok(Json(landing))
}

/// Landing after a cancelled payment. The cart is left as it was.
#[instrument]
pub async fn cancel() -> Json<CheckoutLanding> {
    Json(CheckoutLanding {
        status: CheckoutStatus::Cancelled,
        order: None,
        message: "Checkout cancelled. Your cart has been kept.",
    })
}
