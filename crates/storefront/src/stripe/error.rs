//! Stripe-related errors.

use thiserror::Error;

/// Errors that can occur when calling the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed or timed out.
    #[error("Stripe request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Stripe response error: {0}")]
    Response(String),

    /// Stripe returned an error status.
    #[error("Stripe API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the `error.message` field.
        message: String,
    },
}

impl StripeError {
    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Response(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
        }
    }
}
