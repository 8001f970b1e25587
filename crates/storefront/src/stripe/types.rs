//! Stripe API request, response and event types.
//!
//! Only the fields the shop reads are modelled; everything else in Stripe's
//! payloads is ignored on deserialization.

use std::collections::BTreeMap;

use serde::Deserialize;

use piffy_core::{CurrencyCode, MinorUnits, ProductId, VariantId};

/// Event type names handled by the webhook.
pub mod event_types {
    /// A checkout session finished; payment may still be pending.
    pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
    /// A delayed payment method for a completed session succeeded.
    pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str =
        "checkout.session.async_payment_succeeded";
}

/// Metadata key carrying the customer id on the checkout session.
pub const METADATA_USER_ID: &str = "user_id";
/// Metadata key carrying the catalog product id on each line item's product.
pub const METADATA_PRODUCT_ID: &str = "product_id";
/// Metadata key carrying the catalog variant id on each line item's product.
pub const METADATA_VARIANT_ID: &str = "variant_id";

// =============================================================================
// Checkout session creation
// =============================================================================

/// One priced line sent to the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    /// Display name; also stored as the line item description.
    pub name: String,
    pub unit_amount: MinorUnits,
    pub quantity: u32,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

/// Parameters for `POST /v1/checkout/sessions`.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub currency: CurrencyCode,
    pub line_items: Vec<CheckoutLineItem>,
    pub customer_email: Option<String>,
    pub allowed_countries: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionRequest {
    /// Encode as Stripe's bracketed form parameters
    /// (`line_items[0][price_data][currency]=gbp`).
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[0]".into(), "card".into()),
            ("billing_address_collection".into(), "required".into()),
            ("success_url".into(), self.success_url.clone()),
            ("cancel_url".into(), self.cancel_url.clone()),
        ];

        for (i, country) in self.allowed_countries.iter().enumerate() {
            form.push((
                format!("shipping_address_collection[allowed_countries][{i}]"),
                country.clone(),
            ));
        }

        if let Some(email) = &self.customer_email {
            form.push(("customer_email".into(), email.clone()));
        }

        for (key, value) in &self.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        let currency = self.currency.as_stripe_str();
        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            form.push((format!("{prefix}[price_data][currency]"), currency.into()));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][metadata][{METADATA_PRODUCT_ID}]"),
                item.product_id.to_string(),
            ));
            if let Some(variant_id) = item.variant_id {
                form.push((
                    format!(
                        "{prefix}[price_data][product_data][metadata][{METADATA_VARIANT_ID}]"
                    ),
                    variant_id.to_string(),
                ));
            }
        }

        form
    }

    /// Sum of `unit_amount * quantity` over all lines.
    #[must_use]
    pub fn total(&self) -> Option<MinorUnits> {
        self.line_items.iter().try_fold(MinorUnits::ZERO, |acc, item| {
            acc.checked_add(item.unit_amount.checked_mul(item.quantity)?)
        })
    }
}

/// A created checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page. Only present while the session is open.
    pub url: Option<String>,
}

// =============================================================================
// Line items
// =============================================================================

/// A Stripe list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// A field that is either an object id or, when expanded, the object itself.
///
/// `Id` is tried first so a bare string never lands in `Object`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T: HasId> Expandable<T> {
    /// The object id, whether or not it was expanded.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object(object) => object.id(),
        }
    }
}

/// Stripe objects that carry an `id`.
pub trait HasId {
    fn id(&self) -> &str;
}

impl<T> Expandable<T> {
    /// The expanded object, if Stripe returned one.
    #[must_use]
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Self::Object(object) => Some(object),
            Self::Id(_) => None,
        }
    }
}

/// A line item of a checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub price: Option<LineItemPrice>,
}

impl LineItem {
    /// Quantity purchased; Stripe omits it only for zero-quantity lines.
    #[must_use]
    pub fn quantity(&self) -> u32 {
        self.quantity.unwrap_or(1)
    }

    /// Per-unit amount, falling back to `amount_total / quantity`.
    #[must_use]
    pub fn unit_amount(&self) -> MinorUnits {
        let from_price = self.price.as_ref().and_then(|p| p.unit_amount);
        let derived = self
            .amount_total
            .and_then(|total| total.checked_div(i64::from(self.quantity().max(1))));
        MinorUnits::new(from_price.or(derived).unwrap_or(0))
    }

    /// The expanded Stripe product, if present.
    #[must_use]
    pub fn product(&self) -> Option<&LineItemProduct> {
        self.price.as_ref()?.product.as_ref()?.as_object()
    }

    /// Catalog product id carried in product metadata.
    #[must_use]
    pub fn catalog_product_id(&self) -> Option<ProductId> {
        self.product()?.metadata.get(METADATA_PRODUCT_ID)?.parse().ok()
    }

    /// Catalog variant id carried in product metadata.
    #[must_use]
    pub fn catalog_variant_id(&self) -> Option<VariantId> {
        self.product()?.metadata.get(METADATA_VARIANT_ID)?.parse().ok()
    }

    /// Name shown to the customer: description, else the product name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or_else(|| self.product().map(|p| p.name.as_str()))
    }
}

/// The price attached to a line item.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemPrice {
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub product: Option<Expandable<LineItemProduct>>,
}

/// The Stripe product behind a line item price.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemProduct {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl HasId for LineItemProduct {
    fn id(&self) -> &str {
        &self.id
    }
}

/// An expanded payment intent; only the id is read.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntentRef {
    pub id: String,
}

impl HasId for PaymentIntentRef {
    fn id(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// Webhook events
// =============================================================================

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// The object an event is about. Kept as raw JSON until the type is known.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Payment status of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    #[serde(other)]
    Unknown,
}

/// A checkout session as delivered in `checkout.session.*` events.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub payment_intent: Option<Expandable<PaymentIntentRef>>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub collected_information: Option<CollectedInformation>,
    /// Older API versions put shipping details at the top level.
    #[serde(default)]
    pub shipping_details: Option<ShippingDetails>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutSessionObject {
    /// Payment intent id, whether or not it was expanded.
    #[must_use]
    pub fn payment_intent_id(&self) -> Option<String> {
        self.payment_intent
            .as_ref()
            .map(|intent| intent.id().to_string())
    }

    /// Shipping details from `collected_information`, falling back to the
    /// legacy top-level field.
    #[must_use]
    pub fn shipping(&self) -> Option<&ShippingDetails> {
        self.collected_information
            .as_ref()
            .and_then(|info| info.shipping_details.as_ref())
            .or(self.shipping_details.as_ref())
    }

    /// Customer email as entered on the payment page.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|details| details.email.as_deref())
            .or(self.customer_email.as_deref())
    }

    /// Raw `user_id` metadata value.
    #[must_use]
    pub fn user_id_metadata(&self) -> Option<&str> {
        self.metadata.get(METADATA_USER_ID).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectedInformation {
    #[serde(default)]
    pub shipping_details: Option<ShippingDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            currency: CurrencyCode::GBP,
            line_items: vec![
                CheckoutLineItem {
                    name: "Fox Print".to_string(),
                    unit_amount: MinorUnits::new(1250),
                    quantity: 2,
                    product_id: ProductId::new(1),
                    variant_id: None,
                },
                CheckoutLineItem {
                    name: "Owl Card - Framed".to_string(),
                    unit_amount: MinorUnits::new(700),
                    quantity: 1,
                    product_id: ProductId::new(2),
                    variant_id: Some(VariantId::new(5)),
                },
            ],
            customer_email: Some("jo@example.com".to_string()),
            allowed_countries: vec!["GB".to_string()],
            metadata: BTreeMap::from([("user_id".to_string(), "7".to_string())]),
            success_url: "https://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "https://shop.test/checkout/cancel".to_string(),
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_to_form_fixed_fields() {
        let form = request().to_form();
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "payment_method_types[0]"), Some("card"));
        assert_eq!(value(&form, "billing_address_collection"), Some("required"));
        assert_eq!(
            value(&form, "shipping_address_collection[allowed_countries][0]"),
            Some("GB")
        );
        assert_eq!(value(&form, "metadata[user_id]"), Some("7"));
        assert_eq!(value(&form, "customer_email"), Some("jo@example.com"));
    }

    #[test]
    fn test_to_form_line_items() {
        let form = request().to_form();
        assert_eq!(value(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            value(&form, "line_items[0][price_data][unit_amount]"),
            Some("1250")
        );
        assert_eq!(
            value(&form, "line_items[0][price_data][currency]"),
            Some("gbp")
        );
        assert_eq!(
            value(&form, "line_items[0][price_data][product_data][metadata][product_id]"),
            Some("1")
        );
        assert_eq!(
            value(&form, "line_items[0][price_data][product_data][metadata][variant_id]"),
            None
        );
        assert_eq!(
            value(&form, "line_items[1][price_data][product_data][metadata][variant_id]"),
            Some("5")
        );
    }

    #[test]
    fn test_request_total() {
        assert_eq!(request().total(), Some(MinorUnits::new(3200)));
    }

    #[test]
    fn test_line_item_with_expanded_product() {
        let item: LineItem = serde_json::from_value(serde_json::json!({
            "id": "li_1",
            "description": "Fox Print",
            "quantity": 2,
            "amount_total": 2500,
            "price": {
                "unit_amount": 1250,
                "product": {"id": "prod_1", "name": "Fox Print", "metadata": {"product_id": "1"}}
            }
        }))
        .unwrap();

        assert_eq!(item.catalog_product_id(), Some(ProductId::new(1)));
        assert_eq!(item.catalog_variant_id(), None);
        assert_eq!(item.unit_amount(), MinorUnits::new(1250));
        assert_eq!(item.display_name(), Some("Fox Print"));
    }

    #[test]
    fn test_line_item_without_expansion() {
        let item: LineItem = serde_json::from_value(serde_json::json!({
            "id": "li_2",
            "description": "Owl Card",
            "quantity": 3,
            "amount_total": 2100,
            "price": {"product": "prod_2"}
        }))
        .unwrap();

        assert_eq!(item.catalog_product_id(), None);
        assert_eq!(item.unit_amount(), MinorUnits::new(700));
    }

    #[test]
    fn test_checkout_session_object_fields() {
        let session: CheckoutSessionObject = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "amount_total": 3200,
            "payment_status": "paid",
            "payment_intent": "pi_1",
            "customer_details": {"email": "jo@example.com", "name": "Jo"},
            "collected_information": {
                "shipping_details": {
                    "name": "Jo Bloggs",
                    "address": {"line1": "1 High St", "city": "Leeds", "postal_code": "LS1 1AA", "country": "GB"}
                }
            },
            "metadata": {"user_id": "7"}
        }))
        .unwrap();

        assert_eq!(session.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(session.payment_intent_id().as_deref(), Some("pi_1"));
        assert_eq!(session.email(), Some("jo@example.com"));
        assert_eq!(session.user_id_metadata(), Some("7"));
        let shipping = session.shipping().unwrap();
        assert_eq!(shipping.name.as_deref(), Some("Jo Bloggs"));
        assert_eq!(
            shipping.address.as_ref().unwrap().postal_code.as_deref(),
            Some("LS1 1AA")
        );
    }

    #[test]
    fn test_payment_intent_id_plain_and_expanded() {
        let plain: CheckoutSessionObject = serde_json::from_value(serde_json::json!({
            "id": "cs_test_2",
            "payment_intent": "pi_plain"
        }))
        .unwrap();
        assert!(matches!(plain.payment_intent, Some(Expandable::Id(_))));
        assert_eq!(plain.payment_intent_id().as_deref(), Some("pi_plain"));

        let expanded: CheckoutSessionObject = serde_json::from_value(serde_json::json!({
            "id": "cs_test_3",
            "payment_intent": {"id": "pi_expanded", "object": "payment_intent", "status": "succeeded"}
        }))
        .unwrap();
        assert_eq!(expanded.payment_intent_id().as_deref(), Some("pi_expanded"));

        let missing: CheckoutSessionObject =
            serde_json::from_value(serde_json::json!({"id": "cs_test_4", "payment_intent": null}))
                .unwrap();
        assert_eq!(missing.payment_intent_id(), None);
    }

    #[test]
    fn test_unknown_payment_status() {
        let status: PaymentStatus = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(status, PaymentStatus::Unknown);
    }
}
