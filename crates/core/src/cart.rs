//! Cart line math shared by the guest and persistent carts.
//!
//! A [`CartSnapshot`] is the priced, read-only view of a cart that checkout
//! works from. Guest carts also use it as their mutable state, since the
//! whole cart is serialized into the session.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CurrencyCode, MinorUnits, Price, PriceError, ProductId, VariantId};

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Identifies one line in a cart: a product, optionally narrowed to a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
}

impl LineKey {
    #[must_use]
    pub const fn new(product_id: ProductId, variant_id: Option<VariantId>) -> Self {
        Self {
            product_id,
            variant_id,
        }
    }
}

/// A requested quantity for an existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Replace the line's quantity.
    Set(u32),
    /// Drop the line.
    Remove,
}

impl QuantityChange {
    /// Interpret a raw requested quantity. Anything `<= 0` removes the line;
    /// large values are capped at [`MAX_LINE_QUANTITY`].
    #[must_use]
    pub fn from_requested(quantity: i64) -> Self {
        if quantity <= 0 {
            return Self::Remove;
        }
        let capped = quantity.min(i64::from(MAX_LINE_QUANTITY));
        u32::try_from(capped).map_or(Self::Set(MAX_LINE_QUANTITY), Self::Set)
    }

    /// `Set(0)` becomes [`Self::Remove`]; other quantities are capped at
    /// [`MAX_LINE_QUANTITY`].
    #[must_use]
    pub const fn normalized(self) -> Self {
        match self {
            Self::Set(0) | Self::Remove => Self::Remove,
            Self::Set(quantity) if quantity > MAX_LINE_QUANTITY => Self::Set(MAX_LINE_QUANTITY),
            Self::Set(quantity) => Self::Set(quantity),
        }
    }
}

/// One priced line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub key: LineKey,
    /// Product title, with the variant name appended when present.
    pub title: String,
    /// Unit price in the shop currency, variant adjustment included.
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    /// Unit price in minor units.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] if the price is negative or not representable.
    pub fn unit_amount(&self, currency: CurrencyCode) -> Result<MinorUnits, PriceError> {
        Price::new(self.unit_price, currency).to_minor_units()
    }

    /// `unit_amount * quantity` in minor units.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the product does not fit.
    pub fn line_total(&self, currency: CurrencyCode) -> Result<MinorUnits, PriceError> {
        self.unit_amount(currency)?
            .checked_mul(self.quantity)
            .ok_or(PriceError::Overflow)
    }
}

/// The lines of a cart, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    #[must_use]
    pub const fn new(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of items across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Exact cart total in minor units.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] if any line cannot be priced or the sum overflows.
    pub fn total(&self, currency: CurrencyCode) -> Result<MinorUnits, PriceError> {
        self.lines.iter().try_fold(MinorUnits::ZERO, |acc, line| {
            acc.checked_add(line.line_total(currency)?)
                .ok_or(PriceError::Overflow)
        })
    }

    /// Find a line by key.
    #[must_use]
    pub fn line(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.key == *key)
    }

    /// Add `quantity` of a line, merging into an existing line with the same
    /// key. The title and unit price already captured for an existing line
    /// are kept.
    pub fn add(&mut self, line: CartLine) {
        if line.quantity == 0 {
            return;
        }
        if let Some(existing) = self.lines.iter_mut().find(|l| l.key == line.key) {
            existing.quantity = existing
                .quantity
                .saturating_add(line.quantity)
                .min(MAX_LINE_QUANTITY);
        } else {
            let quantity = line.quantity.min(MAX_LINE_QUANTITY);
            self.lines.push(CartLine { quantity, ..line });
        }
    }

    /// Apply a quantity change. Returns `false` if the line is not in the cart.
    pub fn apply(&mut self, key: &LineKey, change: QuantityChange) -> bool {
        match change.normalized() {
            QuantityChange::Remove => self.remove(key),
            QuantityChange::Set(quantity) => {
                match self.lines.iter_mut().find(|l| l.key == *key) {
                    Some(line) => {
                        line.quantity = quantity;
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Remove a line. Returns `false` if it was not present.
    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.key != *key);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product: i32, price: &str, quantity: u32) -> CartLine {
        CartLine {
            key: LineKey::new(ProductId::new(product), None),
            title: format!("Product {product}"),
            unit_price: price.parse().unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_total_is_exact() {
        let cart = CartSnapshot::new(vec![line(1, "12.50", 2), line(2, "7.00", 1)]);
        assert_eq!(cart.total(CurrencyCode::GBP).unwrap(), MinorUnits::new(3200));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_add_merges_same_key() {
        let mut cart = CartSnapshot::default();
        cart.add(line(1, "5.00", 1));
        cart.add(line(1, "6.00", 2));
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 3);
        assert_eq!(cart.lines[0].unit_price, "5.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_variants_are_separate_lines() {
        let mut cart = CartSnapshot::default();
        cart.add(line(1, "5.00", 1));
        cart.add(CartLine {
            key: LineKey::new(ProductId::new(1), Some(VariantId::new(9))),
            ..line(1, "8.00", 1)
        });
        assert_eq!(cart.lines.len(), 2);
    }

    #[test]
    fn test_zero_quantity_removes_line() {
        let mut cart = CartSnapshot::new(vec![line(1, "12.50", 2)]);
        let key = cart.lines[0].key;
        assert!(cart.apply(&key, QuantityChange::from_requested(0)));
        assert!(cart.is_empty());
        assert_eq!(cart.total(CurrencyCode::GBP).unwrap(), MinorUnits::ZERO);
    }

    #[test]
    fn test_set_zero_removes_line() {
        let mut cart = CartSnapshot::new(vec![line(1, "12.50", 2), line(2, "7.00", 1)]);
        let key = cart.lines[0].key;
        assert!(cart.apply(&key, QuantityChange::Set(0)));
        assert_eq!(cart.lines.len(), 1);
        assert!(cart.line(&key).is_none());
        assert!(cart.lines.iter().all(|l| l.quantity > 0));
    }

    #[test]
    fn test_set_caps_quantity() {
        let mut cart = CartSnapshot::new(vec![line(1, "1.00", 1)]);
        let key = cart.lines[0].key;
        assert!(cart.apply(&key, QuantityChange::Set(u32::MAX)));
        assert_eq!(cart.lines[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_set_quantity_on_missing_line() {
        let mut cart = CartSnapshot::default();
        let key = LineKey::new(ProductId::new(3), None);
        assert!(!cart.apply(&key, QuantityChange::Set(2)));
    }

    #[test]
    fn test_quantity_change_bounds() {
        assert_eq!(QuantityChange::from_requested(-3), QuantityChange::Remove);
        assert_eq!(QuantityChange::from_requested(4), QuantityChange::Set(4));
        assert_eq!(
            QuantityChange::from_requested(i64::MAX),
            QuantityChange::Set(MAX_LINE_QUANTITY)
        );
        assert_eq!(QuantityChange::Set(0).normalized(), QuantityChange::Remove);
        assert_eq!(QuantityChange::Set(3).normalized(), QuantityChange::Set(3));
    }

    #[test]
    fn test_session_json_shape() {
        let cart = CartSnapshot::new(vec![line(4, "19.99", 1)]);
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["lines"][0]["product_id"], 4);
        assert_eq!(json["lines"][0]["unit_price"], "19.99");
        assert!(json["lines"][0].get("variant_id").is_none());
        let back: CartSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
