//! Order history command.

use krushi_sarthi_storefront::AppState;
use krushi_sarthi_storefront::orders::order_history;

use super::{CommandResult, rupees};

#[allow(clippy::print_stdout)]
pub async fn list(state: &AppState) -> CommandResult {
    let Some(address) = state.address().await else {
        println!("Login to see your orders");
        return Ok(());
    };
    let phone = address.phone_number()?;

    let orders = order_history(state, &phone).await;
    if orders.is_empty() {
        println!("No orders found.");
        return Ok(());
    }

    for order in &orders {
        let date = order
            .created_at
            .map_or_else(|| "-".to_string(), |at| at.format("%d %b %Y").to_string());
        let more = match order.item_count() {
            0 | 1 => String::new(),
            n => format!(" +{} more", n - 1),
        };
        println!(
            "{}  {date}  {:<12} {:>10}  {}{more}",
            order.id,
            order.status.to_string(),
            rupees(order.total_amount),
            order.headline(),
        );
        for item in &order.items {
            println!(
                "    {} x {} ({}, {}) = {}",
                item.quantity,
                item.product_name,
                item.variant_title,
                item.vendor,
                rupees(item.line_total()),
            );
        }
    }
    Ok(())
}
