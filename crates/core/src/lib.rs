//! Piffy Core - Shared types library.
//!
//! This crate provides common types used across all Piffy shop components:
//! - `storefront` - Public shop, cart, checkout and payment webhook
//! - `admin` - Catalog and order back-office
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Money is carried as [`rust_decimal::Decimal`] in
//! the catalog and converted to integer [`MinorUnits`] before any arithmetic
//! that is sent to the payment processor.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, slugs and statuses
//! - [`cart`] - Cart lines, quantity rules and totals
//! - [`catalog`] - Categories, products, images and variants
//! - [`order`] - Paid orders and their items

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod order;
pub mod types;

pub use cart::{CartLine, CartSnapshot, LineKey, MAX_LINE_QUANTITY, QuantityChange};
pub use catalog::{
    Category, DEFAULT_PRODUCT_STOCK, Product, ProductDetail, ProductImage, ProductVariant,
};
pub use order::{Order, OrderItem, OrderWithItems, ShippingAddress};
pub use types::*;
