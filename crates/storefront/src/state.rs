//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::{CheckoutSettings, ConfirmationMailer, EmailService};
use crate::stripe::{StripeClient, StripeError};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("stripe client: {0}")]
    Stripe(#[from] StripeError),
    #[error("smtp transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    stripe: StripeClient,
    checkout: CheckoutSettings,
    mailer: ConfirmationMailer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe client or the SMTP transport cannot be
    /// built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let stripe = StripeClient::new(&config.stripe)?;
        let checkout = CheckoutSettings::from_config(&config);
        let email = config
            .email
            .as_ref()
            .map(|email| EmailService::new(email, config.stripe.currency))
            .transpose()?;

        let mailer = ConfirmationMailer::new(email);
        if !mailer.is_enabled() {
            tracing::warn!("SMTP_HOST not set, order confirmation email disabled");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                checkout,
                mailer,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Stripe API client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Fixed checkout parameters.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutSettings {
        &self.inner.checkout
    }

    /// Order confirmation sender.
    #[must_use]
    pub fn mailer(&self) -> &ConfirmationMailer {
        &self.inner.mailer
    }
}
