//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! The webhook route maps [`WebhookError`](crate::services::WebhookError)
//! itself, since Stripe only looks at the status code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{CartError, CheckoutError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout could not be started.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Cart(err) => match err {
                CartError::ProductNotFound(_) | CartError::VariantNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                CartError::Price(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CartError::Repository(_) | CartError::Session(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::Price(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::Cart(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    // Don't expose internal error details to clients
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Cart(err) => match err {
                CartError::ProductNotFound(_) => "Product not found".to_string(),
                CartError::VariantNotFound { .. } => "Variant not found".to_string(),
                CartError::Price(_) => "Product price is unavailable".to_string(),
                CartError::Repository(_) | CartError::Session(_) => {
                    "Internal server error".to_string()
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => "Your cart is empty".to_string(),
                CheckoutError::PaymentProvider(_) => {
                    "Payment could not be started, please try again".to_string()
                }
                CheckoutError::Price(_) => "Product price is unavailable".to_string(),
                CheckoutError::Cart(_) => "Internal server error".to_string(),
            },
            Self::NotFound(_) | Self::BadRequest(_) => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let message = self.public_message();
        (status, Json(ErrorBody { error: &message })).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use piffy_core::ProductId;

    use super::*;
    use crate::stripe::StripeError;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product fox-print".to_string());
        assert_eq!(err.to_string(), "Not found: product fox-print");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(CartError::ProductNotFound(ProductId::new(3)).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_checkout_errors() {
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        let provider = AppError::from(CheckoutError::PaymentProvider(StripeError::Api {
            status: 500,
            message: "sk_test key leaked in message".to_string(),
        }));
        assert_eq!(provider.status(), StatusCode::BAD_GATEWAY);
        assert!(!provider.public_message().contains("sk_test"));
    }
}
