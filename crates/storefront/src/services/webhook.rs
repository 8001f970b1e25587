//! Stripe webhook processing.
//!
//! A delivery moves through `received -> verified -> (ignored | duplicate |
//! processed)`:
//!
//! 1. The `Stripe-Signature` header is checked against the raw body.
//! 2. Only payment-confirming checkout events are materialized.
//! 3. An existing order for the session short-circuits as a duplicate.
//! 4. Line items are fetched from Stripe and resolved against the catalog.
//! 5. Order and items are written in one transaction. A concurrent delivery
//!    that loses the insert race also reports a duplicate.
//! 6. The customer's persistent cart is cleared and a confirmation email is
//!    dispatched. Failures here are logged; the order already exists.

use std::future::Future;

use axum::http::StatusCode;
use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use piffy_core::{
    CurrencyCode, LineKey, MinorUnits, OrderId, OrderWithItems, ProductId, ShippingAddress,
    UserId, VariantId,
};

use crate::db::{
    CartRepository, CatalogRepository, NewOrder, NewOrderItem, OrderRepository, RepositoryError,
};
use crate::stripe::{
    CheckoutSessionObject, Event, LineItem, PaymentStatus, SignatureError, StripeClient,
    StripeError, event_types, verify_signature,
};

/// Errors that stop a webhook delivery from being processed.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("order store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("payment provider error: {0}")]
    Provider(#[from] StripeError),
}

impl WebhookError {
    /// Status returned to Stripe. 5xx makes Stripe retry the delivery.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidSignature(_) | Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a redelivery could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Provider(_))
    }
}

/// A reported line item that matched no catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line item {line_item_id} ({description:?}) matches no product")]
pub struct UnresolvedLineItem {
    pub line_item_id: String,
    pub description: Option<String>,
}

/// What happened to an acknowledged delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// No signing secret is configured; nothing was read.
    VerificationDisabled,
    /// Event type the shop does not act on.
    Ignored { event_type: String },
    /// Checkout completed but payment has not cleared yet.
    AwaitingPayment { session_id: String },
    /// An order for this session already exists.
    Duplicate { session_id: String },
    /// A new order was created.
    Processed {
        order_id: OrderId,
        items: usize,
        unresolved: usize,
    },
}

/// What a line item asks for, before catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductHint {
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub title: Option<String>,
}

impl ProductHint {
    #[must_use]
    pub fn from_line_item(item: &LineItem) -> Self {
        Self {
            product_id: item.catalog_product_id(),
            variant_id: item.catalog_variant_id(),
            title: item.display_name().map(String::from),
        }
    }
}

// =============================================================================
// Seams
// =============================================================================

/// Order storage as seen by the webhook.
pub trait OrderLedger: Send + Sync {
    /// Whether an order for the checkout session exists.
    fn order_exists(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Resolve a line item to a catalog line. The metadata id wins; the
    /// title is only used when no id was sent.
    fn resolve_product(
        &self,
        hint: &ProductHint,
    ) -> impl Future<Output = Result<Option<LineKey>, RepositoryError>> + Send;

    /// Insert the order and items atomically. `None` means another delivery
    /// created the order first.
    fn create_order(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<Option<OrderWithItems>, RepositoryError>> + Send;

    /// Delete a customer's persistent cart.
    fn clear_cart(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Source of a checkout session's line items.
pub trait LineItemSource: Send + Sync {
    fn line_items(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<LineItem>, StripeError>> + Send;
}

impl LineItemSource for StripeClient {
    async fn line_items(&self, session_id: &str) -> Result<Vec<LineItem>, StripeError> {
        self.list_line_items(session_id).await
    }
}

/// Fire-and-forget notification of a new order.
pub trait OrderNotifier: Send + Sync {
    fn order_confirmed(&self, order: &OrderWithItems);
}

/// [`OrderLedger`] over the shop database.
#[derive(Debug, Clone)]
pub struct PgOrderLedger {
    pool: PgPool,
}

impl PgOrderLedger {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OrderLedger for PgOrderLedger {
    async fn order_exists(&self, session_id: &str) -> Result<bool, RepositoryError> {
        Ok(OrderRepository::new(&self.pool)
            .find_by_session_id(session_id)
            .await?
            .is_some())
    }

    async fn resolve_product(&self, hint: &ProductHint) -> Result<Option<LineKey>, RepositoryError> {
        let catalog = CatalogRepository::new(&self.pool);

        let product = match (hint.product_id, hint.title.as_deref()) {
            (Some(id), _) => catalog.get_product(id).await?,
            (None, Some(title)) => catalog.find_product_by_title(title).await?,
            (None, None) => None,
        };
        let Some(product) = product else {
            return Ok(None);
        };

        let variant_id = match hint.variant_id {
            Some(variant_id) => catalog
                .get_variant(product.id, variant_id)
                .await?
                .map(|variant| variant.id),
            None => None,
        };

        Ok(Some(LineKey::new(product.id, variant_id)))
    }

    async fn create_order(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .create_with_items(order, items)
            .await
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
        CartRepository::new(&self.pool).clear(user_id).await
    }
}

// =============================================================================
// Receiver
// =============================================================================

/// Processes one webhook delivery.
pub struct WebhookReceiver<'a, L, S, N> {
    pub ledger: &'a L,
    pub line_items: &'a S,
    pub notifier: &'a N,
    pub webhook_secret: Option<&'a SecretString>,
    pub currency: CurrencyCode,
    pub tolerance_secs: i64,
}

impl<L, S, N> WebhookReceiver<'_, L, S, N>
where
    L: OrderLedger,
    S: LineItemSource,
    N: OrderNotifier,
{
    /// Verify and process a delivery.
    ///
    /// `now` is the current Unix time, used for the signature tolerance.
    ///
    /// # Errors
    ///
    /// See [`WebhookError::status_code`] for how each error maps to a response.
    #[instrument(skip_all)]
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: i64,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(secret) = self.webhook_secret else {
            warn!("Stripe webhook secret not configured, acknowledging without processing");
            return Ok(WebhookOutcome::VerificationDisabled);
        };

        let header = signature.ok_or(SignatureError::MissingHeader)?;
        verify_signature(payload, header, secret, now, self.tolerance_secs)?;

        let event: Event = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let requires_paid = match event.event_type.as_str() {
            event_types::CHECKOUT_SESSION_COMPLETED => true,
            event_types::CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED => false,
            _ => {
                debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring event");
                return Ok(WebhookOutcome::Ignored {
                    event_type: event.event_type,
                });
            }
        };

        let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        if requires_paid
            && !matches!(
                session.payment_status,
                Some(PaymentStatus::Paid | PaymentStatus::NoPaymentRequired)
            )
        {
            info!(session_id = %session.id, "Checkout completed, payment pending");
            return Ok(WebhookOutcome::AwaitingPayment {
                session_id: session.id,
            });
        }

        self.materialize(&event.id, &session).await
    }

    async fn materialize(
        &self,
        event_id: &str,
        session: &CheckoutSessionObject,
    ) -> Result<WebhookOutcome, WebhookError> {
        if self.ledger.order_exists(&session.id).await? {
            info!(session_id = %session.id, event_id = %event_id, "Duplicate delivery");
            return Ok(WebhookOutcome::Duplicate {
                session_id: session.id.clone(),
            });
        }

        let line_items = self.line_items.line_items(&session.id).await?;
        let (items, unresolved) = self.resolve_items(&line_items).await?;
        for skipped in &unresolved {
            warn!(session_id = %session.id, error = %skipped, "Skipping line item");
        }

        let currency = session
            .currency
            .as_deref()
            .and_then(|code| code.parse().ok())
            .unwrap_or(self.currency);
        let order = new_order(session, &items, currency);

        let Some(created) = self.ledger.create_order(&order, &items).await? else {
            info!(session_id = %session.id, "Order created by a concurrent delivery");
            return Ok(WebhookOutcome::Duplicate {
                session_id: session.id.clone(),
            });
        };

        info!(
            order_id = %created.order.id,
            session_id = %session.id,
            items = created.items.len(),
            "Order created"
        );

        if let Some(user_id) = order.user_id
            && let Err(e) = self.ledger.clear_cart(user_id).await
        {
            warn!(user_id = %user_id, error = %e, "Failed to clear cart after order");
        }

        self.notifier.order_confirmed(&created);

        Ok(WebhookOutcome::Processed {
            order_id: created.order.id,
            items: created.items.len(),
            unresolved: unresolved.len(),
        })
    }

    async fn resolve_items(
        &self,
        line_items: &[LineItem],
    ) -> Result<(Vec<NewOrderItem>, Vec<UnresolvedLineItem>), RepositoryError> {
        let mut resolved = Vec::with_capacity(line_items.len());
        let mut unresolved = Vec::new();

        for item in line_items {
            let hint = ProductHint::from_line_item(item);
            match self.ledger.resolve_product(&hint).await? {
                Some(key) => resolved.push(NewOrderItem {
                    product_id: key.product_id,
                    variant_id: key.variant_id,
                    title: hint.title.unwrap_or_default(),
                    quantity: item.quantity(),
                    unit_amount: item.unit_amount(),
                }),
                None => unresolved.push(UnresolvedLineItem {
                    line_item_id: item.id.clone(),
                    description: hint.title,
                }),
            }
        }

        Ok((resolved, unresolved))
    }
}

/// Build the order row from the session.
///
/// The total is what Stripe charged; the item sum is only a fallback when
/// `amount_total` is absent.
fn new_order(
    session: &CheckoutSessionObject,
    items: &[NewOrderItem],
    currency: CurrencyCode,
) -> NewOrder {
    let total = session.amount_total.map_or_else(
        || {
            items.iter().fold(MinorUnits::ZERO, |acc, item| {
                item.unit_amount
                    .checked_mul(item.quantity)
                    .and_then(|line| acc.checked_add(line))
                    .unwrap_or(acc)
            })
        },
        MinorUnits::new,
    );

    let shipping_details = session.shipping();
    let address = shipping_details.and_then(|s| s.address.clone()).unwrap_or_default();
    let name = shipping_details
        .and_then(|s| s.name.clone())
        .or_else(|| session.customer_details.as_ref().and_then(|c| c.name.clone()));

    NewOrder {
        user_id: session
            .user_id_metadata()
            .and_then(|raw| raw.parse::<UserId>().ok()),
        email: session.email().map(String::from),
        total_price: total.to_decimal(currency),
        stripe_session_id: session.id.clone(),
        stripe_payment_intent: session.payment_intent_id(),
        shipping: ShippingAddress {
            name,
            line1: address.line1,
            line2: address.line2,
            city: address.city,
            postal_code: address.postal_code,
            country: address.country,
        },
    }
}

// =============================================================================
// In-memory ledger for tests
// =============================================================================

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::Utc;
    use piffy_core::{
        LineKey, Order, OrderId, OrderItem, OrderItemId, OrderStatus, OrderWithItems, ProductId,
        UserId,
    };

    use super::{
        LineItemSource, NewOrder, NewOrderItem, OrderLedger, OrderNotifier, ProductHint,
        RepositoryError,
    };
    use crate::stripe::{LineItem, StripeError};

    /// Orders, catalog titles and carts held in memory.
    #[derive(Debug, Default)]
    pub struct MemoryLedger {
        pub products: HashMap<ProductId, String>,
        pub orders: Mutex<Vec<OrderWithItems>>,
        pub carts: Mutex<Vec<UserId>>,
        pub fail_writes: bool,
        /// `order_exists` always answers `false`, as for a delivery racing
        /// another one past the existence check.
        pub stale_reads: bool,
    }

    impl MemoryLedger {
        pub fn with_products(products: &[(i32, &str)]) -> Self {
            Self {
                products: products
                    .iter()
                    .map(|(id, title)| (ProductId::new(*id), (*title).to_string()))
                    .collect(),
                ..Self::default()
            }
        }

        #[allow(clippy::unwrap_used)]
        pub fn order_count(&self) -> usize {
            self.orders.lock().unwrap().len()
        }
    }

    #[allow(clippy::unwrap_used)]
    impl OrderLedger for MemoryLedger {
        async fn order_exists(&self, session_id: &str) -> Result<bool, RepositoryError> {
            if self.stale_reads {
                return Ok(false);
            }
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .any(|o| o.order.stripe_session_id == session_id))
        }

        async fn resolve_product(
            &self,
            hint: &ProductHint,
        ) -> Result<Option<LineKey>, RepositoryError> {
            let product_id = match (hint.product_id, hint.title.as_deref()) {
                (Some(id), _) => self.products.contains_key(&id).then_some(id),
                (None, Some(title)) => self
                    .products
                    .iter()
                    .filter(|(_, t)| t.as_str() == title)
                    .map(|(id, _)| *id)
                    .min(),
                (None, None) => None,
            };
            Ok(product_id.map(|id| LineKey::new(id, hint.variant_id)))
        }

        async fn create_order(
            &self,
            order: &NewOrder,
            items: &[NewOrderItem],
        ) -> Result<Option<OrderWithItems>, RepositoryError> {
            if self.fail_writes {
                return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
            }
            let mut orders = self.orders.lock().unwrap();
            if orders
                .iter()
                .any(|o| o.order.stripe_session_id == order.stripe_session_id)
            {
                return Ok(None);
            }

            let order_id = OrderId::new(i32::try_from(orders.len()).unwrap() + 1);
            let created = OrderWithItems {
                order: Order {
                    id: order_id,
                    user_id: order.user_id,
                    email: order.email.clone(),
                    total_price: order.total_price,
                    stripe_session_id: order.stripe_session_id.clone(),
                    stripe_payment_intent: order.stripe_payment_intent.clone(),
                    shipping: order.shipping.clone(),
                    status: OrderStatus::Paid,
                    created_at: Utc::now(),
                },
                items: items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| OrderItem {
                        id: OrderItemId::new(i32::try_from(i).unwrap() + 1),
                        order_id,
                        product_id: Some(item.product_id),
                        variant_id: item.variant_id,
                        title: item.title.clone(),
                        quantity: i32::try_from(item.quantity).unwrap(),
                        unit_amount: item.unit_amount,
                    })
                    .collect(),
            };
            orders.push(created.clone());
            Ok(Some(created))
        }

        async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
            self.carts.lock().unwrap().push(user_id);
            Ok(())
        }
    }

    /// Fixed line items, or a failure.
    #[derive(Debug, Default)]
    pub struct StaticLineItems {
        pub items: Vec<LineItem>,
        pub fail: bool,
    }

    impl LineItemSource for StaticLineItems {
        async fn line_items(&self, _session_id: &str) -> Result<Vec<LineItem>, StripeError> {
            if self.fail {
                return Err(StripeError::Request("connection reset".to_string()));
            }
            Ok(self.items.clone())
        }
    }

    /// Records confirmed order ids.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<OrderId>>,
    }

    #[allow(clippy::unwrap_used)]
    impl OrderNotifier for RecordingNotifier {
        fn order_confirmed(&self, order: &OrderWithItems) {
            self.sent.lock().unwrap().push(order.order.id);
        }
    }
}
