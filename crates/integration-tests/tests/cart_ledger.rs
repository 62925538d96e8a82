//! Cart ledger behaviour through app state.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use krushi_sarthi_core::{CartKey, CartLedger};
use krushi_sarthi_integration_tests::{TestContext, address, product};
use krushi_sarthi_storefront::storage::{DeviceStore, JsonFileStore};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_adding_same_variant_merges_into_one_line() {
    let ctx = TestContext::new();
    let (urea, bag) = product("urea", "45kg", 266, 300);

    for _ in 0..5 {
        ctx.state.add_to_cart(urea.clone(), bag.clone()).await;
    }

    let cart = ctx.state.cart().await;
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.lines()[0].quantity(), 5);
}

#[tokio::test]
async fn test_quantity_floor_removes_line() {
    let ctx = TestContext::new();
    let (urea, bag) = product("urea", "45kg", 266, 300);
    let (neem, bottle) = product("neem-oil", "1L", 150, 150);
    ctx.state.add_to_cart(urea, bag).await;
    ctx.state.add_to_cart(neem, bottle).await;

    assert!(ctx.state.set_cart_quantity(&CartKey::new("urea", "45kg"), 0).await);
    assert!(ctx.state.set_cart_quantity(&CartKey::new("neem-oil", "1L"), -1).await);

    assert!(ctx.state.cart().await.is_empty());
}

#[tokio::test]
async fn test_unknown_line_is_a_no_op() {
    let ctx = TestContext::new();
    let (urea, bag) = product("urea", "45kg", 266, 300);
    ctx.state.add_to_cart(urea, bag).await;
    let before = ctx.state.cart().await;

    assert!(!ctx.state.set_cart_quantity(&CartKey::new("urea", "50kg"), 3).await);
    assert!(!ctx.state.remove_from_cart(&CartKey::new("dap", "45kg")).await);

    assert_eq!(ctx.state.cart().await, before);
}

#[tokio::test]
async fn test_net_total_and_savings() {
    let ctx = TestContext::new();
    let (seeds, packet) = product("tomato-seeds", "10g", 100, 120);
    let (gloves, pair) = product("gloves", "Pair", 50, 50);
    ctx.state.add_to_cart(seeds.clone(), packet.clone()).await;
    ctx.state.add_to_cart(seeds, packet).await;
    ctx.state.add_to_cart(gloves, pair).await;

    let cart = ctx.state.cart().await;
    assert_eq!(cart.net_total(), Decimal::from(250));
    assert_eq!(cart.total_savings(), Decimal::from(40));
    // 2 x 10 g + 1 x fallback 1000 g
    assert_eq!(cart.total_weight_grams(), 1020);
}

#[tokio::test]
async fn test_cart_and_address_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let device: Arc<dyn DeviceStore> =
        Arc::new(JsonFileStore::new(dir.path().join("device").join("state.json")));
    let ctx = TestContext::with(krushi_sarthi_integration_tests::ScriptedRates::new(), device);

    let (urea, bag) = product("urea", "45kg", 266, 300);
    ctx.state.add_to_cart(urea.clone(), bag.clone()).await;
    ctx.state.add_to_cart(urea, bag).await;
    ctx.state.set_address(address()).await;
    ctx.state.flush().await;

    let restarted = ctx.restart().await;
    assert_eq!(restarted.cart().await, ctx.state.cart().await);
    assert_eq!(restarted.address().await, Some(address()));
}

#[tokio::test]
async fn test_unreadable_device_state_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ not json").unwrap();
    let device: Arc<dyn DeviceStore> = Arc::new(JsonFileStore::new(path));

    let ctx = TestContext::with(krushi_sarthi_integration_tests::ScriptedRates::new(), device);
    let restarted = ctx.restart().await;

    assert_eq!(restarted.cart().await, CartLedger::new());
    assert_eq!(restarted.address().await, None);
}
