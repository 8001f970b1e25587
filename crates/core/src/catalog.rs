//! Catalog entities: categories, products, images and variants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, CurrencyCode, ImageId, Price, PriceError, ProductId, VariantId};

/// Default stock for a newly created product.
pub const DEFAULT_PRODUCT_STOCK: i32 = 10;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
}

impl Category {
    /// Maximum length of a category name.
    pub const MAX_NAME_LENGTH: usize = 100;
}

/// A product listed in the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Maximum length of a product title.
    pub const MAX_TITLE_LENGTH: usize = 255;

    /// The product's base price in the given currency.
    #[must_use]
    pub const fn price_in(&self, currency: CurrencyCode) -> Price {
        Price::new(self.price, currency)
    }
}

/// A gallery image attached to a product. Lower positions sort first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ImageId,
    pub product_id: ProductId,
    /// Path relative to the media root, e.g. `products/3f9c....jpg`.
    pub path: String,
    pub position: i32,
}

/// A purchasable variation of a product ("A3 print", "Framed").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub stock: i32,
    /// Added to the product price; may be negative.
    pub price_adjust: Decimal,
}

impl ProductVariant {
    /// Maximum length of a variant name.
    pub const MAX_NAME_LENGTH: usize = 100;

    /// Product price plus this variant's adjustment.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if the adjustment takes the price below zero.
    pub fn final_price(&self, product: &Product, currency: CurrencyCode) -> Result<Price, PriceError> {
        product.price_in(currency).adjusted(self.price_adjust)
    }
}

/// A product with its category, ordered images and variants.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Category,
    pub images: Vec<ProductImage>,
    pub variants: Vec<ProductVariant>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(price: &str) -> Product {
        Product {
            id: ProductId::new(1),
            category_id: CategoryId::new(1),
            title: "Fox Print".to_string(),
            slug: "fox-print".to_string(),
            description: String::new(),
            price: price.parse().unwrap(),
            stock: DEFAULT_PRODUCT_STOCK,
            featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn variant(adjust: &str) -> ProductVariant {
        ProductVariant {
            id: VariantId::new(1),
            product_id: ProductId::new(1),
            name: "Framed".to_string(),
            stock: 2,
            price_adjust: adjust.parse().unwrap(),
        }
    }

    #[test]
    fn test_final_price_adds_adjustment() {
        let price = variant("15.00")
            .final_price(&product("20.00"), CurrencyCode::GBP)
            .unwrap();
        assert_eq!(price.amount, "35.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_final_price_rejects_negative_result() {
        assert!(
            variant("-25.00")
                .final_price(&product("20.00"), CurrencyCode::GBP)
                .is_err()
        );
    }
}
