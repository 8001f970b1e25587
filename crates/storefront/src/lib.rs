//! Piffy Studio storefront library.
//!
//! Catalog reads, guest and persistent carts, Stripe Checkout initiation and
//! the Stripe webhook that turns paid sessions into orders. The binary in
//! `main.rs` wires these into an axum server.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;
