//! Session-related types.
//!
//! Types stored in the session for identity and guest cart state.

use serde::{Deserialize, Serialize};

use piffy_core::{Email, UserId};

/// Session-stored customer identity.
///
/// Written by whatever signs the customer in; the shop only reads it to pick
/// between the guest and persistent cart and to tag checkout metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Customer's database ID.
    pub id: UserId,
    /// Customer's email address, prefilled on the payment page.
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in customer.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the guest cart (a serialized `CartSnapshot`).
    pub const CART: &str = "cart";

    /// Key for the checkout session id issued to this browser, so the
    /// success page can clear the guest cart once payment went through.
    pub const PENDING_CHECKOUT: &str = "pending_checkout_session";
}
