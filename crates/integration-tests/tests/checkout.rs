//! Placing orders against the remote profile store.

#![allow(clippy::unwrap_used)]

use krushi_sarthi_core::{OrderStatus, PaymentMethod};
use krushi_sarthi_integration_tests::{PHONE, TestContext, address, product};
use krushi_sarthi_storefront::orders::order_history;
use krushi_sarthi_storefront::{CheckoutAggregator, CheckoutError, CheckoutPhase, NoticeKind, profile};
use rust_decimal::Decimal;
use serde_json::json;

async fn ready_checkout(ctx: &TestContext) -> CheckoutAggregator {
    let (urea, bag) = product("urea", "1kg", 300, 350);
    let (neem, bottle) = product("neem-oil", "500ml", 150, 150);
    ctx.state.add_to_cart(urea.clone(), bag.clone()).await;
    ctx.state.add_to_cart(urea, bag).await;
    ctx.state.add_to_cart(neem, bottle).await;
    ctx.state.set_address(address()).await;
    CheckoutAggregator::new(ctx.state.clone())
}

#[tokio::test]
async fn test_commit_aborts_when_profile_is_missing() {
    let ctx = TestContext::new();
    let checkout = ready_checkout(&ctx).await;
    let mut notices = ctx.state.subscribe_notices();
    let before = ctx.state.cart().await;

    let err = checkout.handle_make_payment().await.unwrap_err();

    assert!(matches!(err, CheckoutError::ProfileNotFound));
    assert_eq!(ctx.state.cart().await, before);
    assert!(ctx.profiles.document(PHONE).await.is_none());
    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.message, "User profile not found");
}

#[tokio::test]
async fn test_successful_commit_appends_one_order_and_clears_cart() {
    let ctx = TestContext::new();
    let earlier = json!({"id": "1700000000000", "totalAmount": 120, "status": "Delivered"});
    ctx.profiles
        .insert(PHONE, vec![address()], vec![earlier.clone()])
        .await;
    let checkout = ready_checkout(&ctx).await;
    ctx.state.refresh_shipping_quote().await.unwrap();

    let order = checkout.handle_make_payment().await.unwrap();

    assert!(ctx.state.cart().await.is_empty());
    assert_eq!(checkout.phase().await, CheckoutPhase::Committed);

    let orders = ctx.profiles.orders(PHONE).await;
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0], earlier);
    assert_eq!(orders[1]["id"], json!(order.id().as_str()));
    assert_eq!(orders[1]["totalAmount"], json!(750.0));
    assert_eq!(orders[1]["shippingFee"], json!(70.0));
    assert_eq!(orders[1]["paymentMethod"], json!("COD"));
    assert_eq!(orders[1]["status"], json!("Processing"));
    assert_eq!(orders[1]["items"].as_array().unwrap().len(), 2);
    assert_eq!(order.payable(), Decimal::from(820));
}

#[tokio::test]
async fn test_failed_write_keeps_cart_and_retry_succeeds() {
    let ctx = TestContext::new();
    ctx.profiles.insert(PHONE, vec![address()], Vec::new()).await;
    let checkout = ready_checkout(&ctx).await;
    let before = ctx.state.cart().await;

    ctx.profiles.fail_writes(true);
    let err = checkout.handle_make_payment().await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to place order");
    assert_eq!(ctx.state.cart().await, before);
    assert!(ctx.profiles.orders(PHONE).await.is_empty());
    assert_eq!(checkout.phase().await, CheckoutPhase::Ready);

    ctx.profiles.fail_writes(false);
    checkout.handle_make_payment().await.unwrap();
    assert!(ctx.state.cart().await.is_empty());
    assert_eq!(ctx.profiles.orders(PHONE).await.len(), 1);
}

#[tokio::test]
async fn test_saved_address_enables_checkout_and_history() {
    let ctx = TestContext::new();
    let checkout = ready_checkout(&ctx).await;

    let mut draft = address();
    draft.phone = format!("+91 {PHONE}");
    profile::save_address(&ctx.state, &draft).await.unwrap();
    assert_eq!(ctx.profiles.document(PHONE).await.unwrap().profile.len(), 1);

    let order = checkout.handle_make_payment().await.unwrap();

    let phone = ctx.state.address().await.unwrap().phone_number().unwrap();
    let history = order_history(&ctx.state, &phone).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, order.id().as_str());
    assert_eq!(history[0].status, OrderStatus::Processing);
    assert_eq!(history[0].item_count(), 2);
}

#[tokio::test]
async fn test_online_payment_is_not_offered() {
    let ctx = TestContext::new();
    let checkout = ready_checkout(&ctx).await;

    assert!(checkout.select_payment(PaymentMethod::Online).is_err());
    assert_eq!(checkout.payment_method(), PaymentMethod::CashOnDelivery);
}

#[tokio::test]
async fn test_history_of_unknown_customer_is_empty() {
    let ctx = TestContext::new();
    let phone = address().phone_number().unwrap();
    assert!(order_history(&ctx.state, &phone).await.is_empty());
    assert_eq!(ctx.profiles.reads(), 1);
}
