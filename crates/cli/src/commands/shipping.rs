//! Shipping estimate command.

use krushi_sarthi_storefront::AppState;

use super::{CommandResult, rupees, shipping_available};

#[allow(clippy::print_stdout)]
pub async fn estimate(state: &AppState) -> CommandResult {
    let fingerprint = state.shipping_fingerprint().await;
    if !fingerprint.is_estimable() {
        println!("Add a delivery pincode and at least one item to estimate shipping");
        return Ok(());
    }

    println!("Estimating shipping to {} for {} g…", fingerprint.pincode, fingerprint.weight_grams);
    match state.refresh_shipping_quote().await {
        Some(quote) if shipping_available(Some(quote)) => {
            println!("Shipping: {}", rupees(quote.cost()));
        }
        _ => println!("Shipping charges unavailable"),
    }
    super::cart::print_totals(&state.totals().await);
    Ok(())
}
