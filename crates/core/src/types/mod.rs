//! Core types for the Piffy shop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, MinorUnits, Price, PriceError};
pub use slug::{Slug, SlugError};
pub use status::*;
