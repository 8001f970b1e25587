//! Integration tests for Stripe webhook deliveries.
//!
//! A local `wiremock` server stands in for the Stripe API; orders are written
//! through `PgOrderLedger` to a real database.
//!
//! These tests require a `PostgreSQL` database (`TEST_DATABASE_URL`).

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use piffy_core::{CurrencyCode, LineKey, OrderStatus, Product, ProductVariant, UserId};
use piffy_integration_tests::{
    insert_category, insert_product, insert_user, insert_variant, test_pool, unique,
};
use piffy_storefront::config::StripeConfig;
use piffy_storefront::db::{CartRepository, OrderRepository};
use piffy_storefront::services::{ConfirmationMailer, PgOrderLedger, WebhookOutcome, WebhookReceiver};
use piffy_storefront::stripe::{DEFAULT_TOLERANCE_SECS, StripeClient, compute_signature};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn webhook_secret() -> SecretString {
    SecretString::from("whsec_integration_tests")
}

fn stripe_client(server: &MockServer) -> StripeClient {
    StripeClient::new(&StripeConfig {
        secret_key: SecretString::from("sk_test_integration"),
        webhook_secret: Some(webhook_secret()),
        api_base: server.uri(),
        currency: CurrencyCode::GBP,
        allowed_countries: vec!["GB".to_string()],
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn now() -> i64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    i64::try_from(secs).unwrap()
}

fn event(event_type: &str, session_id: &str, payment_status: &str, user_id: UserId) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": unique("evt"),
        "type": event_type,
        "data": {
            "object": {
                "id": session_id,
                "amount_total": 4250,
                "currency": "gbp",
                "payment_status": payment_status,
                "payment_intent": "pi_integration",
                "customer_details": {"email": "jo@example.com", "name": "Jo Card"},
                "collected_information": {
                    "shipping_details": {
                        "name": "Jo Bloggs",
                        "address": {
                            "line1": "1 High Street",
                            "city": "Leeds",
                            "postal_code": "LS1 1AA",
                            "country": "GB"
                        }
                    }
                },
                "metadata": {"user_id": user_id.to_string()}
            }
        }
    }))
    .unwrap()
}

fn line_items(product: &Product, variant: &ProductVariant) -> Value {
    json!({
        "object": "list",
        "has_more": false,
        "data": [
            {
                "id": "li_plain",
                "description": product.title,
                "quantity": 2,
                "amount_total": 2500,
                "price": {
                    "unit_amount": 1250,
                    "product": {
                        "id": "prod_plain",
                        "name": product.title,
                        "metadata": {"product_id": product.id.to_string()}
                    }
                }
            },
            {
                "id": "li_variant",
                "description": format!("{} - {}", product.title, variant.name),
                "quantity": 1,
                "amount_total": 1750,
                "price": {
                    "unit_amount": 1750,
                    "product": {
                        "id": "prod_variant",
                        "name": product.title,
                        "metadata": {
                            "product_id": product.id.to_string(),
                            "variant_id": variant.id.to_string()
                        }
                    }
                }
            }
        ]
    })
}

async fn mount_line_items(server: &MockServer, session_id: &str, body: Value, calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/checkout/sessions/{session_id}/line_items")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(calls)
        .mount(server)
        .await;
}

async fn deliver(pool: &PgPool, server: &MockServer, payload: &[u8]) -> WebhookOutcome {
    let ledger = PgOrderLedger::new(pool.clone());
    let client = stripe_client(server);
    let mailer = ConfirmationMailer::new(None);
    let secret = webhook_secret();
    let receiver = WebhookReceiver {
        ledger: &ledger,
        line_items: &client,
        notifier: &mailer,
        webhook_secret: Some(&secret),
        currency: CurrencyCode::GBP,
        tolerance_secs: DEFAULT_TOLERANCE_SECS,
    };

    let timestamp = now();
    let header = format!(
        "t={timestamp},v1={}",
        compute_signature(payload, &secret, timestamp).unwrap()
    );
    receiver
        .handle(payload, Some(&header), timestamp)
        .await
        .unwrap()
}

async fn count_orders(pool: &PgPool, session_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM shop.order WHERE stripe_session_id = $1")
        .bind(session_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_replayed_delivery_creates_one_order() {
    let pool = test_pool().await;
    let category = insert_category(&pool).await;
    let product = insert_product(&pool, &category, Decimal::new(1250, 2)).await;
    let variant = insert_variant(&pool, &product, "A3", Decimal::new(500, 2)).await;
    let user = insert_user(&pool).await;
    CartRepository::new(&pool)
        .add(user, LineKey::new(product.id, None), 2)
        .await
        .unwrap();

    let server = MockServer::start().await;
    let session_id = unique("cs_test");
    // The replay is answered from the ledger without another Stripe call.
    mount_line_items(&server, &session_id, line_items(&product, &variant), 1).await;

    let payload = event("checkout.session.completed", &session_id, "paid", user);

    let first = deliver(&pool, &server, &payload).await;
    assert!(
        matches!(
            first,
            WebhookOutcome::Processed {
                items: 2,
                unresolved: 0,
                ..
            }
        ),
        "unexpected outcome: {first:?}"
    );

    let second = deliver(&pool, &server, &payload).await;
    assert_eq!(
        second,
        WebhookOutcome::Duplicate {
            session_id: session_id.clone()
        }
    );
    assert_eq!(count_orders(&pool, &session_id).await, 1);

    let created = OrderRepository::new(&pool)
        .find_with_items_by_session_id(&session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.order.total_price, Decimal::new(4250, 2));
    assert_eq!(created.order.status, OrderStatus::Paid);
    assert_eq!(created.order.user_id, Some(user));
    assert_eq!(created.order.email.as_deref(), Some("jo@example.com"));
    assert_eq!(created.order.shipping.city.as_deref(), Some("Leeds"));
    assert_eq!(
        created.order.stripe_payment_intent.as_deref(),
        Some("pi_integration")
    );
    assert_eq!(created.items.len(), 2);
    assert_eq!(created.items[0].quantity, 2);
    assert_eq!(created.items[1].variant_id, Some(variant.id));

    let remaining = CartRepository::new(&pool).lines(user).await.unwrap();
    assert!(remaining.is_empty(), "cart should be cleared after the order");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_simultaneous_deliveries_create_one_order() {
    let pool = test_pool().await;
    let category = insert_category(&pool).await;
    let product = insert_product(&pool, &category, Decimal::new(1250, 2)).await;
    let variant = insert_variant(&pool, &product, "A3", Decimal::new(500, 2)).await;
    let user = insert_user(&pool).await;

    let server = MockServer::start().await;
    let session_id = unique("cs_test");
    // Both deliveries may pass the existence check before either commits.
    Mock::given(method("GET"))
        .and(path(format!("/v1/checkout/sessions/{session_id}/line_items")))
        .respond_with(ResponseTemplate::new(200).set_body_json(line_items(&product, &variant)))
        .expect(1..=2)
        .mount(&server)
        .await;

    let payload = event("checkout.session.completed", &session_id, "paid", user);

    let (a, b) = tokio::join!(
        deliver(&pool, &server, &payload),
        deliver(&pool, &server, &payload)
    );
    let outcomes = [a, b];

    let processed = outcomes
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::Processed { .. }))
        .count();
    let duplicates = outcomes
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::Duplicate { .. }))
        .count();
    assert_eq!((processed, duplicates), (1, 1), "outcomes: {outcomes:?}");
    assert_eq!(count_orders(&pool, &session_id).await, 1);

    let created = OrderRepository::new(&pool)
        .find_with_items_by_session_id(&session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.items.len(), 2);
    assert_eq!(
        created.order.stripe_payment_intent.as_deref(),
        Some("pi_integration")
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_async_payment_creates_order_after_pending_completion() {
    let pool = test_pool().await;
    let category = insert_category(&pool).await;
    let product = insert_product(&pool, &category, Decimal::new(1250, 2)).await;
    let variant = insert_variant(&pool, &product, "A4", Decimal::new(500, 2)).await;
    let user = insert_user(&pool).await;

    let server = MockServer::start().await;
    let session_id = unique("cs_test");
    mount_line_items(&server, &session_id, line_items(&product, &variant), 1).await;

    let pending = event("checkout.session.completed", &session_id, "unpaid", user);
    let outcome = deliver(&pool, &server, &pending).await;
    assert_eq!(
        outcome,
        WebhookOutcome::AwaitingPayment {
            session_id: session_id.clone()
        }
    );
    assert_eq!(count_orders(&pool, &session_id).await, 0);

    let succeeded = event(
        "checkout.session.async_payment_succeeded",
        &session_id,
        "paid",
        user,
    );
    let outcome = deliver(&pool, &server, &succeeded).await;
    assert!(matches!(outcome, WebhookOutcome::Processed { items: 2, .. }));
    assert_eq!(count_orders(&pool, &session_id).await, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_unknown_line_items_are_skipped_and_titles_resolve() {
    let pool = test_pool().await;
    let category = insert_category(&pool).await;
    let product = insert_product(&pool, &category, Decimal::new(700, 2)).await;
    let user = insert_user(&pool).await;

    let server = MockServer::start().await;
    let session_id = unique("cs_test");
    let body = json!({
        "object": "list",
        "has_more": false,
        "data": [
            {
                "id": "li_by_title",
                "description": product.title,
                "quantity": 1,
                "amount_total": 700,
                "price": {"unit_amount": 700, "product": "prod_unexpanded"}
            },
            {
                "id": "li_gone",
                "description": unique("Deleted Product"),
                "quantity": 1,
                "amount_total": 900,
                "price": {"unit_amount": 900, "product": "prod_gone"}
            }
        ]
    });
    mount_line_items(&server, &session_id, body, 1).await;

    let payload = event("checkout.session.completed", &session_id, "paid", user);
    let outcome = deliver(&pool, &server, &payload).await;

    assert!(
        matches!(
            outcome,
            WebhookOutcome::Processed {
                items: 1,
                unresolved: 1,
                ..
            }
        ),
        "unexpected outcome: {outcome:?}"
    );

    let created = OrderRepository::new(&pool)
        .find_with_items_by_session_id(&session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.items[0].product_id, Some(product.id));
    assert_eq!(created.items[0].title, product.title);
}
