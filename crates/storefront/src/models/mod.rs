//! Domain models for the storefront.
//!
//! Catalog and order entities are shared with the admin binary and live in
//! `piffy_core`; this module only holds storefront session state.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
