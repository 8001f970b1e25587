//! Orders created from confirmed payments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{MinorUnits, OrderId, OrderItemId, OrderStatus, ProductId, UserId, VariantId};

/// Shipping details collected by the hosted payment page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    /// ISO 3166-1 alpha-2 code.
    pub country: Option<String>,
}

/// A paid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub email: Option<String>,
    /// Amount charged, in the currency's standard unit.
    pub total_price: Decimal,
    /// Checkout session that paid for this order. Unique.
    pub stripe_session_id: String,
    pub stripe_payment_intent: Option<String>,
    pub shipping: ShippingAddress,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// One purchased line of an order.
///
/// The title is copied at purchase time so the order still reads correctly
/// after the product is renamed or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub title: String,
    pub quantity: i32,
    /// Unit amount charged, in minor units.
    pub unit_amount: MinorUnits,
}

impl OrderItem {
    /// `unit_amount * quantity`, or `None` on overflow or a negative quantity.
    #[must_use]
    pub fn line_total(&self) -> Option<MinorUnits> {
        self.unit_amount
            .checked_mul(u32::try_from(self.quantity).ok()?)
    }
}

/// An order together with its items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
