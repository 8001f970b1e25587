//! Piffy Studio back-office library.
//!
//! Bearer-token protected JSON API for the catalog (categories, products,
//! images, variants) and for moving paid orders through fulfilment.
//! Shares the shop `PostgreSQL` schema with the storefront.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
