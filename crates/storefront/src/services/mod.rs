//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Guest (session) and persistent cart storage
//! - `checkout` - Cart to Stripe Checkout session
//! - `webhook` - Signed Stripe events to orders, exactly once
//! - `email` - Order confirmation email

pub mod cart;
pub mod checkout;
pub mod email;
pub mod webhook;

pub use cart::{ActiveCart, CartError, CartStore, PersistentCart, SessionCart, price_line};
pub use checkout::{CheckoutError, CheckoutRedirect, CheckoutSettings};
pub use email::{ConfirmationMailer, EmailError, EmailService};
pub use webhook::{
    LineItemSource, OrderLedger, OrderNotifier, PgOrderLedger, WebhookError, WebhookOutcome,
    WebhookReceiver,
};
