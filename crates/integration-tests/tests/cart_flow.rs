//! Cart reconciliation against a mock backend.

#![allow(clippy::unwrap_used)]

use lustre_core::{ProductId, Quantity};
use lustre_integration_tests::{TestContext, cart_line, products};
use lustre_storefront::cart::AddOutcome;
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_rapid_double_add_creates_one_line() {
    let ctx = TestContext::signed_in().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cart_line(21, 2, 1)])))
        .mount(&ctx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cart/"))
        .and(body_json(json!({"product": 2, "quantity": 1})))
        .respond_with(ResponseTemplate::new(201).set_body_json(cart_line(21, 2, 1)))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let cart = ctx.storefront.cart();
    let (first, second) = tokio::join!(
        cart.add(ProductId::new(2), Quantity::ONE),
        cart.add(ProductId::new(2), Quantity::ONE)
    );

    assert_eq!(first.unwrap(), AddOutcome::Created);
    assert_eq!(second.unwrap(), AddOutcome::AlreadyInFlight);
    assert_eq!(cart.count(), 1);
}

#[tokio::test]
async fn test_unknown_product_is_shown_unavailable() {
    let ctx = TestContext::signed_in().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/api/products/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products()))
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([cart_line(1, 1, 1), cart_line(2, 404, 3)])),
        )
        .mount(&ctx.server)
        .await;

    let storefront = &ctx.storefront;
    storefront.cart().fetch().await;
    assert_eq!(storefront.cart().count(), 4);

    let items = storefront.catalog().enrich(&storefront.cart().state().items).await;
    assert_eq!(items[1].display_name(), "Unavailable");

    let summary = storefront.summary().await;
    assert_eq!(summary.subtotal, Decimal::new(2_500, 0));
    assert_eq!(summary.shipping, Decimal::ZERO);
}

#[tokio::test]
async fn test_cart_outage_is_recorded_not_raised() {
    let ctx = TestContext::signed_in().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&ctx.server)
        .await;

    let cart = ctx.storefront.cart();
    cart.fetch().await;

    let state = cart.state();
    assert!(!state.loading);
    assert!(state.error.as_ref().unwrap().contains("503"));
    assert_eq!(state.count(), 0);
}
