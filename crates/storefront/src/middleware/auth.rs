//! Identity extractor.
//!
//! Sign-in itself lives outside the shop. Whatever signs a customer in writes
//! a [`CurrentUser`] under `session_keys::CURRENT_USER`; the shop only reads it.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};

/// Extractor that optionally gets the signed-in customer.
///
/// Never rejects: guests get `OptionalAuth(None)` and use the session cart.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(OptionalAuth(user): OptionalAuth) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Hello, {}!", u.email),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(session_keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}
