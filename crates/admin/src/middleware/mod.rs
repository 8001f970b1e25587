//! HTTP middleware stack for admin.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Bearer token check on `/manage`
//! 4. Body limit on image uploads

pub mod auth;

pub use auth::require_bearer_token;
