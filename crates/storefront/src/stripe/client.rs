//! Stripe REST API client.

use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::StripeConfig;

use super::error::StripeError;
use super::types::{CheckoutSession, CheckoutSessionRequest, LineItem, List};

/// Page size for list endpoints (Stripe's maximum).
const PAGE_LIMIT: &str = "100";

/// Stripe API client for Checkout.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl StripeClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Request` if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StripeError::Request(e.to_string()))?;

        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, Stripe rejects it, or the
    /// response has no payment page URL.
    #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&request.to_form())
            .send()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))?;

        let session: CheckoutSession = Self::parse(response).await?;
        if session.url.is_none() {
            return Err(StripeError::Response(format!(
                "checkout session {} has no url",
                session.id
            )));
        }

        debug!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }

    /// List every line item of a checkout session with products expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails or cannot be parsed.
    #[instrument(skip(self))]
    pub async fn list_line_items(&self, session_id: &str) -> Result<Vec<LineItem>, StripeError> {
        let url = format!(
            "{}/v1/checkout/sessions/{session_id}/line_items",
            self.api_base
        );
        let mut items: Vec<LineItem> = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> =
                vec![("expand[]", "data.price.product"), ("limit", PAGE_LIMIT)];
            if let Some(cursor) = starting_after.as_deref() {
                query.push(("starting_after", cursor));
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(self.secret_key.expose_secret())
                .query(&query)
                .send()
                .await
                .map_err(|e| StripeError::Request(e.to_string()))?;

            let page: List<LineItem> = Self::parse(response).await?;
            let next = page.data.last().map(|item| item.id.clone());
            items.extend(page.data);

            match next {
                Some(cursor) if page.has_more => starting_after = Some(cursor),
                _ => break,
            }
        }

        debug!(count = items.len(), "Fetched checkout line items");
        Ok(items)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, StripeError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| StripeError::Response(e.to_string()));
        }

        let message = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or_else(|| status.to_string());

        warn!(status = status.as_u16(), message = %message, "Stripe API error");
        Err(StripeError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
