//! Checkout initiation.
//!
//! Turns the current cart into a Stripe Checkout session and hands back the
//! hosted payment page URL. Nothing is written locally: the order only exists
//! once the webhook confirms payment.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, instrument};

use piffy_core::{CartSnapshot, CurrencyCode, PriceError};

use crate::config::StorefrontConfig;
use crate::models::CurrentUser;
use crate::stripe::{
    CheckoutLineItem, CheckoutSessionRequest, METADATA_USER_ID, StripeClient, StripeError,
};

use super::cart::{CartError, CartStore};

/// Placeholder Stripe substitutes with the session id on redirect.
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Errors from starting a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no lines; no payment session was requested.
    #[error("cart is empty")]
    EmptyCart,

    /// The payment processor rejected or failed the request.
    #[error("payment provider error: {0}")]
    PaymentProvider(#[from] StripeError),

    #[error("cart error: {0}")]
    Cart(#[from] CartError),

    #[error("price error: {0}")]
    Price(#[from] PriceError),
}

/// Fixed checkout parameters, built once from configuration.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: CurrencyCode,
    pub allowed_countries: Vec<String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSettings {
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self {
            currency: config.stripe.currency,
            allowed_countries: config.stripe.allowed_countries.clone(),
            success_url: format!(
                "{}/checkout/success?session_id={SESSION_ID_PLACEHOLDER}",
                config.base_url
            ),
            cancel_url: format!("{}/checkout/cancel", config.base_url),
        }
    }
}

/// A created payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub url: String,
}

/// Price every cart line in minor units.
///
/// # Errors
///
/// Returns a [`PriceError`] if a line price is negative or has sub-penny
/// precision.
pub fn build_line_items(
    snapshot: &CartSnapshot,
    currency: CurrencyCode,
) -> Result<Vec<CheckoutLineItem>, PriceError> {
    snapshot
        .lines
        .iter()
        .map(|line| {
            Ok(CheckoutLineItem {
                name: line.title.clone(),
                unit_amount: line.unit_amount(currency)?,
                quantity: line.quantity,
                product_id: line.key.product_id,
                variant_id: line.key.variant_id,
            })
        })
        .collect()
}

/// Build the session request for a cart.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` for an empty cart and
/// `CheckoutError::Price` if a line cannot be priced.
pub fn build_request(
    snapshot: &CartSnapshot,
    user: Option<&CurrentUser>,
    settings: &CheckoutSettings,
) -> Result<CheckoutSessionRequest, CheckoutError> {
    if snapshot.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut metadata = BTreeMap::new();
    if let Some(user) = user {
        metadata.insert(METADATA_USER_ID.to_string(), user.id.to_string());
    }

    Ok(CheckoutSessionRequest {
        currency: settings.currency,
        line_items: build_line_items(snapshot, settings.currency)?,
        customer_email: user.map(|u| u.email.to_string()),
        allowed_countries: settings.allowed_countries.clone(),
        metadata,
        success_url: settings.success_url.clone(),
        cancel_url: settings.cancel_url.clone(),
    })
}

/// Start a checkout for the given cart. The cart itself is not modified.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` without calling Stripe when the cart is
/// empty, and `CheckoutError::PaymentProvider` if Stripe fails.
#[instrument(skip(cart, stripe, user, settings), fields(user_id = ?user.map(|u| u.id)))]
pub async fn initiate<C: CartStore>(
    cart: &C,
    stripe: &StripeClient,
    user: Option<&CurrentUser>,
    settings: &CheckoutSettings,
) -> Result<CheckoutRedirect, CheckoutError> {
    let snapshot = cart.snapshot().await?;
    let request = build_request(&snapshot, user, settings)?;

    let session = stripe.create_checkout_session(&request).await?;
    let url = session.url.ok_or_else(|| {
        StripeError::Response(format!("checkout session {} has no url", session.id))
    })?;

    info!(
        session_id = %session.id,
        lines = request.line_items.len(),
        "Checkout session started"
    );

    Ok(CheckoutRedirect {
        session_id: session.id,
        url,
    })
}
