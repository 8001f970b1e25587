//! Integration tests for signed-in customer carts.
//!
//! These tests require a `PostgreSQL` database (`TEST_DATABASE_URL`).

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use piffy_core::{CurrencyCode, LineKey, MAX_LINE_QUANTITY, QuantityChange};
use piffy_integration_tests::{
    insert_category, insert_product, insert_user, insert_variant, test_pool,
};
use piffy_storefront::services::{CartError, CartStore, PersistentCart, price_line};
use rust_decimal::Decimal;

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_add_merges_lines_and_prices_live() {
    let pool = test_pool().await;
    let category = insert_category(&pool).await;
    let product = insert_product(&pool, &category, Decimal::new(1250, 2)).await;
    let variant = insert_variant(&pool, &product, "A3", Decimal::new(500, 2)).await;
    let user = insert_user(&pool).await;
    let cart = PersistentCart::new(pool.clone(), user);

    let plain = LineKey::new(product.id, None);
    let sized = LineKey::new(product.id, Some(variant.id));

    cart.add(price_line(&pool, plain, 1, CurrencyCode::GBP).await.unwrap())
        .await
        .unwrap();
    cart.add(price_line(&pool, plain, 2, CurrencyCode::GBP).await.unwrap())
        .await
        .unwrap();
    cart.add(price_line(&pool, sized, 1, CurrencyCode::GBP).await.unwrap())
        .await
        .unwrap();

    let snapshot = cart.snapshot().await.unwrap();
    assert_eq!(snapshot.lines.len(), 2);
    assert_eq!(snapshot.line(&plain).unwrap().quantity, 3);

    let sized_line = snapshot.line(&sized).unwrap();
    assert_eq!(sized_line.unit_price, Decimal::new(1750, 2));
    assert!(sized_line.title.ends_with(" - A3"));

    // 3 x 12.50 + 17.50
    assert_eq!(snapshot.total(CurrencyCode::GBP).unwrap().get(), 5500);
    assert_eq!(snapshot.item_count(), 4);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_quantity_changes_and_clear() {
    let pool = test_pool().await;
    let category = insert_category(&pool).await;
    let product = insert_product(&pool, &category, Decimal::new(350, 2)).await;
    let user = insert_user(&pool).await;
    let cart = PersistentCart::new(pool.clone(), user);
    let key = LineKey::new(product.id, None);

    cart.add(price_line(&pool, key, 1, CurrencyCode::GBP).await.unwrap())
        .await
        .unwrap();

    assert!(cart.set_quantity(key, QuantityChange::Set(5)).await.unwrap());
    assert_eq!(cart.snapshot().await.unwrap().line(&key).unwrap().quantity, 5);

    assert!(cart.set_quantity(key, QuantityChange::Remove).await.unwrap());
    assert!(cart.snapshot().await.unwrap().is_empty());
    assert!(!cart.remove(key).await.unwrap());

    cart.add(price_line(&pool, key, 2, CurrencyCode::GBP).await.unwrap())
        .await
        .unwrap();
    cart.clear().await.unwrap();
    assert!(cart.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_set_zero_deletes_line() {
    let pool = test_pool().await;
    let category = insert_category(&pool).await;
    let product = insert_product(&pool, &category, Decimal::new(350, 2)).await;
    let user = insert_user(&pool).await;
    let cart = PersistentCart::new(pool.clone(), user);
    let key = LineKey::new(product.id, None);

    cart.add(price_line(&pool, key, 3, CurrencyCode::GBP).await.unwrap())
        .await
        .unwrap();

    assert!(cart.set_quantity(key, QuantityChange::Set(0)).await.unwrap());
    assert!(cart.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_merged_quantity_is_capped() {
    let pool = test_pool().await;
    let category = insert_category(&pool).await;
    let product = insert_product(&pool, &category, Decimal::new(100, 2)).await;
    let user = insert_user(&pool).await;
    let cart = PersistentCart::new(pool.clone(), user);
    let key = LineKey::new(product.id, None);

    for _ in 0..2 {
        let line = price_line(&pool, key, MAX_LINE_QUANTITY, CurrencyCode::GBP)
            .await
            .unwrap();
        cart.add(line).await.unwrap();
    }

    let snapshot = cart.snapshot().await.unwrap();
    assert_eq!(snapshot.line(&key).unwrap().quantity, MAX_LINE_QUANTITY);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_unknown_variant_is_rejected() {
    let pool = test_pool().await;
    let category = insert_category(&pool).await;
    let product = insert_product(&pool, &category, Decimal::new(100, 2)).await;
    let other = insert_product(&pool, &category, Decimal::new(100, 2)).await;
    let foreign = insert_variant(&pool, &other, "A4", Decimal::ZERO).await;

    let result = price_line(
        &pool,
        LineKey::new(product.id, Some(foreign.id)),
        1,
        CurrencyCode::GBP,
    )
    .await;

    assert!(
        matches!(result, Err(CartError::VariantNotFound { .. })),
        "unexpected result: {result:?}"
    );
}
