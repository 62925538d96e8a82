//! Cart commands.

use std::path::Path;

use krushi_sarthi_core::{CartKey, CheckoutTotals, Locale, Product, Variant};
use krushi_sarthi_storefront::AppState;
use thiserror::Error;
use tracing::info;

use super::{CommandResult, rupees};

#[derive(Debug, Error)]
pub enum CatalogLookupError {
    #[error("Product not found in catalog: {0}")]
    UnknownProduct(String),

    #[error("Product {product} has no variant {variant:?}")]
    UnknownVariant { product: String, variant: String },

    #[error("{0} is out of stock")]
    OutOfStock(String),
}

/// Read a catalog export: a JSON array of product documents.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a product is malformed.
pub async fn load_catalog(path: &Path) -> Result<Vec<Product>, Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(path).await?;
    let products: Vec<Product> = serde_json::from_str(&content)?;
    info!(path = %path.display(), products = products.len(), "Loaded catalog");
    Ok(products)
}

fn find_variant(
    catalog: Vec<Product>,
    product_id: &str,
    variant_title: &str,
) -> Result<(Product, Variant), CatalogLookupError> {
    let product = catalog
        .into_iter()
        .find(|p| p.id().as_str() == product_id && p.is_visible())
        .ok_or_else(|| CatalogLookupError::UnknownProduct(product_id.to_string()))?;
    if product.is_out_of_stock() {
        return Err(CatalogLookupError::OutOfStock(product.name().en.clone()));
    }
    let variant = product
        .variant(variant_title)
        .cloned()
        .ok_or_else(|| CatalogLookupError::UnknownVariant {
            product: product_id.to_string(),
            variant: variant_title.to_string(),
        })?;
    Ok((product, variant))
}

#[allow(clippy::print_stdout)]
pub async fn add(state: &AppState, catalog: &Path, product_id: &str, variant: &str) -> CommandResult {
    let (product, variant) = find_variant(load_catalog(catalog).await?, product_id, variant)?;
    println!(
        "Added {} ({}) to cart",
        product.name().get(Locale::En),
        variant.key()
    );
    state.add_to_cart(product, variant).await;
    show(state).await
}

#[allow(clippy::print_stdout)]
pub async fn set(state: &AppState, product_id: &str, variant: &str, quantity: i64) -> CommandResult {
    if !state
        .set_cart_quantity(&CartKey::new(product_id, variant), quantity)
        .await
    {
        println!("No cart line for {product_id} / {variant}");
    }
    show(state).await
}

#[allow(clippy::print_stdout)]
pub async fn remove(state: &AppState, product_id: &str, variant: &str) -> CommandResult {
    if !state
        .remove_from_cart(&CartKey::new(product_id, variant))
        .await
    {
        println!("No cart line for {product_id} / {variant}");
    }
    show(state).await
}

#[allow(clippy::print_stdout)]
pub async fn clear(state: &AppState) -> CommandResult {
    state.clear_cart().await;
    println!("Cart cleared");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn show(state: &AppState) -> CommandResult {
    let cart = state.cart().await;
    if cart.is_empty() {
        println!("Your cart is empty");
        return Ok(());
    }

    for line in cart.lines() {
        println!(
            "{:>3} x {} ({}) @ {} = {}",
            line.quantity(),
            line.product().name().get(Locale::En),
            line.variant().key(),
            rupees(line.variant().price()),
            rupees(line.line_total()),
        );
    }
    print_totals(&state.totals().await);
    println!("Parcel weight: {} g", cart.total_weight_grams());
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn print_totals(totals: &CheckoutTotals) {
    println!("Subtotal: {}", rupees(totals.merchandise));
    if !totals.savings.is_zero() {
        println!("You save: {}", rupees(totals.savings));
    }
    if totals.shipping_waived() {
        println!("Shipping: FREE (was {})", rupees(totals.shipping_quoted));
    } else if !totals.shipping_charged.is_zero() {
        println!("Shipping: {}", rupees(totals.shipping_charged));
    }
    println!("Total: {}", rupees(totals.payable));
}
