//! Stripe webhook endpoint.
//!
//! Server-to-server: no session, no CSRF. The raw body is needed verbatim
//! for signature verification, so it is taken as `Bytes`.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::services::{PgOrderLedger, WebhookOutcome, WebhookReceiver};
use crate::state::AppState;
use crate::stripe::{DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER};

#[derive(Serialize)]
struct Ack {
    received: bool,
}

/// Receive a Stripe event.
///
/// 200 acknowledges the delivery (including duplicates and ignored events),
/// 400 rejects it for good, 500 asks Stripe to retry.
#[instrument(skip_all, fields(bytes = body.len()))]
pub async fn stripe(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let ledger = PgOrderLedger::new(state.pool().clone());
    let receiver = WebhookReceiver {
        ledger: &ledger,
        line_items: state.stripe(),
        notifier: state.mailer(),
        webhook_secret: state.config().stripe.webhook_secret.as_ref(),
        currency: state.config().stripe.currency,
        tolerance_secs: DEFAULT_TOLERANCE_SECS,
    };

    let now = chrono::Utc::now().timestamp();
    match receiver.handle(&body, signature, now).await {
        Ok(outcome) => {
            if let WebhookOutcome::Processed { order_id, .. } = &outcome {
                info!(order_id = %order_id, "Stripe webhook processed");
            }
            (StatusCode::OK, Json(Ack { received: true })).into_response()
        }
        Err(err) => {
            if err.is_retryable() {
                let event_id = sentry::capture_error(&err);
                error!(
                    error = %err,
                    sentry_event_id = %event_id,
                    "Stripe webhook failed, awaiting retry"
                );
            } else {
                warn!(error = %err, "Stripe webhook rejected");
            }
            (err.status_code(), Json(Ack { received: false })).into_response()
        }
    }
}
