//! Integration tests for the admin bearer token gate.
//!
//! The router runs in-process against a lazily connected pool, so requests
//! that never reach a repository need no database.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use piffy_admin::config::AdminConfig;
use piffy_admin::routes;
use piffy_admin::state::AppState;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

const TOKEN: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6d";

fn app() -> axum::Router {
    let config = AdminConfig {
        database_url: SecretString::from("postgres://piffy@127.0.0.1:1/unused"),
        host: [127, 0, 0, 1].into(),
        port: 3001,
        api_token: SecretString::from(TOKEN),
        media_dir: PathBuf::from("media"),
        max_upload_bytes: 1024,
        sentry_dsn: None,
        sentry_environment: None,
    };
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://piffy@127.0.0.1:1/unused")
        .unwrap();
    let state = AppState::new(config, pool);

    routes::routes(&state).with_state(state)
}

async fn status_of(request: Request<Body>) -> StatusCode {
    app().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let request = Request::get("/manage/products")
        .body(Body::empty())
        .unwrap();

    assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_token_is_unauthorized() {
    let request = Request::get("/manage/orders")
        .header(header::AUTHORIZATION, "Bearer not-the-token")
        .body(Body::empty())
        .unwrap();

    assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_scheme_is_unauthorized() {
    let request = Request::delete("/manage/images/1")
        .header(header::AUTHORIZATION, format!("Basic {TOKEN}"))
        .body(Body::empty())
        .unwrap();

    assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_reaches_handler() {
    // A malformed path id is rejected by the handler's extractor, after auth
    // and before any query runs.
    let request = Request::get("/manage/orders/not-a-number")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();

    assert_eq!(status_of(request).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let request = Request::get("/manage/nothing-here")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();

    assert_eq!(status_of(request).await, StatusCode::NOT_FOUND);
}
