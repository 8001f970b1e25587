//! Bearer token authentication for the back-office API.
//!
//! Every `/manage` request must carry `Authorization: Bearer <ADMIN_API_TOKEN>`.
//! The comparison is constant-time.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::AppState;

/// Middleware rejecting requests without the configured bearer token.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let token = extract_bearer_token(request.headers().get(AUTHORIZATION));

    match token {
        Some(token) if token_matches(token, &state.config().api_token) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request with wrong token");
            AppError::Unauthorized("invalid bearer token".to_string()).into_response()
        }
        None => AppError::Unauthorized("missing bearer token".to_string()).into_response(),
    }
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn token_matches(candidate: &str, expected: &SecretString) -> bool {
    candidate
        .as_bytes()
        .ct_eq(expected.expose_secret().as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        let header = HeaderValue::from_static("Bearer tok-123");
        assert_eq!(extract_bearer_token(Some(&header)), Some("tok-123"));

        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);

        let header = HeaderValue::from_static("Bearer   ");
        assert_eq!(extract_bearer_token(Some(&header)), None);

        assert_eq!(extract_bearer_token(None), None);
    }

    #[test]
    fn test_token_matches() {
        let expected = SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6d");
        assert!(token_matches("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6d", &expected));
        assert!(!token_matches("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", &expected));
        assert!(!token_matches("", &expected));
    }
}
