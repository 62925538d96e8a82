//! Order history.
//!
//! Orders are stored as written by whichever app version placed them, so
//! entries are read field by field and anything unreadable falls back to a
//! blank value instead of failing the whole list.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use krushi_sarthi_core::{OrderStatus, PhoneNumber};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::state::AppState;

/// One purchased line as shown in order details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub product_name: String,
    pub vendor: String,
    pub variant_title: String,
    pub quantity: u64,
    pub unit_price: Decimal,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A past order as shown in the history list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub shipping_fee: Decimal,
    pub payment_method: String,
    pub items: Vec<OrderItem>,
}

impl OrderRecord {
    /// Read one stored order; `index` supplies the id of entries without one.
    #[must_use]
    pub fn from_value(value: &Value, index: usize) -> Self {
        let id = match value.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => format!("order-{index}"),
        };

        Self {
            id,
            created_at: value
                .get("createdAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            status: value
                .get("status")
                .and_then(Value::as_str)
                .map(|s| OrderStatus::from(s.to_string()))
                .unwrap_or_default(),
            total_amount: amount(value.get("totalAmount")),
            shipping_fee: amount(value.get("shippingFee")),
            payment_method: value
                .get("paymentMethod")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            items: value
                .get("items")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(order_item).collect())
                .unwrap_or_default(),
        }
    }

    /// Name of the first product, used as the list row title.
    #[must_use]
    pub fn headline(&self) -> &str {
        self.items
            .first()
            .map_or("Product Name", |item| item.product_name.as_str())
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

fn order_item(value: &Value) -> OrderItem {
    let product = value.get("product");
    let variant = value.get("variant");
    OrderItem {
        product_name: english(product.and_then(|p| p.get("productName"))),
        vendor: product
            .and_then(|p| p.get("vendor"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        variant_title: english(variant.and_then(|v| v.get("title"))),
        quantity: value
            .get("quantity")
            .and_then(Value::as_u64)
            .unwrap_or_default(),
        unit_price: amount(variant.and_then(|v| v.get("price"))),
    }
}

/// English text from either a localized object or a bare string.
fn english(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(obj) => obj
            .get("en")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        None => String::new(),
    }
}

/// A money amount stored as a number or a numeric string.
fn amount(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(Decimal::from_f64))
            .unwrap_or_default(),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

/// Read stored orders, newest first; undated entries go last.
#[must_use]
pub fn parse_orders(values: &[Value]) -> Vec<OrderRecord> {
    let mut orders: Vec<OrderRecord> = values
        .iter()
        .enumerate()
        .map(|(index, value)| OrderRecord::from_value(value, index))
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

/// The order history of the customer with `phone`.
///
/// A missing profile or a failed read yields an empty list.
#[instrument(skip(state), fields(phone = %phone))]
pub async fn order_history(state: &AppState, phone: &PhoneNumber) -> Vec<OrderRecord> {
    let read = tokio::time::timeout(
        state.config().request_timeout,
        state.profiles().get_profile(phone.profile_key()),
    )
    .await;

    match read {
        Ok(Ok(Some(document))) => parse_orders(&document.orders),
        Ok(Ok(None)) => Vec::new(),
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to fetch orders");
            Vec::new()
        }
        Err(_) => {
            warn!("Fetching orders timed out");
            Vec::new()
        }
    }
}
