//! Stripe Checkout integration.
//!
//! This module provides:
//! - [`StripeClient`] for creating hosted checkout sessions and listing the
//!   line items of a completed session
//! - Request/response and webhook event types
//! - Webhook signature verification ([`verify_signature`])
//!
//! # Flow
//!
//! 1. The cart is turned into a [`CheckoutSessionRequest`] and sent to Stripe
//! 2. The customer is redirected to the returned hosted payment page
//! 3. Stripe calls `POST /webhooks/stripe` with a signed event
//! 4. The event is verified and the paid session becomes an order

mod client;
mod error;
mod signature;
mod types;

pub use client::StripeClient;
pub use error::StripeError;
pub use signature::{
    DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, SignatureError, compute_signature,
    verify_signature,
};
pub use types::{
    Address, CheckoutLineItem, CheckoutSession, CheckoutSessionObject, CheckoutSessionRequest,
    CollectedInformation, CustomerDetails, Event, EventData, Expandable, HasId, LineItem,
    LineItemPrice, LineItemProduct, List, METADATA_PRODUCT_ID, METADATA_USER_ID,
    METADATA_VARIANT_ID, PaymentIntentRef, PaymentStatus, ShippingDetails, event_types,
};
