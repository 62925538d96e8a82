//! Checkout command.

use krushi_sarthi_core::PaymentMethod;
use krushi_sarthi_storefront::{AppState, CheckoutAggregator, CheckoutPhase};

use super::{CommandResult, rupees, shipping_available};

#[allow(clippy::print_stdout)]
pub async fn run(state: &AppState, payment: &str, confirm: bool) -> CommandResult {
    let checkout = CheckoutAggregator::new(state.clone());
    checkout.select_payment(payment.parse::<PaymentMethod>()?)?;

    match checkout.phase().await {
        CheckoutPhase::NoAddress => {
            println!("Please add a delivery address first (`ks-cli address set`)");
            return Ok(());
        }
        CheckoutPhase::EmptyCart => {
            println!("Your cart is empty");
            return Ok(());
        }
        _ => {}
    }

    if let Some(address) = state.address().await {
        println!("Deliver to:");
        for line in address.display_lines() {
            println!("  {line}");
        }
    }

    if !shipping_available(state.refresh_shipping_quote().await) {
        println!("Shipping charges unavailable");
    }
    super::cart::print_totals(&checkout.totals().await);
    println!("Payment: {}", checkout.payment_method().label());

    if !confirm {
        println!("Run again with --confirm to place the order");
        checkout.leave();
        return Ok(());
    }

    let order = checkout.handle_make_payment().await?;
    println!(
        "Order {} placed: {} ({})",
        order.id(),
        rupees(order.payable()),
        order.status()
    );
    checkout.leave();
    Ok(())
}
