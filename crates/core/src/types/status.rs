//! Status enums for orders and checkout.

use serde::{Deserialize, Serialize};

/// Fulfillment status of a placed order.
///
/// The client only ever writes [`OrderStatus::Processing`]; every other
/// transition belongs to the external fulfillment system, which may also
/// write values this client does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    #[default]
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    /// A status written by the fulfillment system that this client does not model.
    Other(String),
}

impl OrderStatus {
    /// Whether no further transitions are expected.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "Processing"),
            Self::Shipped => write!(f, "Shipped"),
            Self::OutForDelivery => write!(f, "Out for delivery"),
            Self::Delivered => write!(f, "Delivered"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            // Older app releases wrote the longer form.
            "processing" | "processing your order" => Self::Processing,
            "shipped" => Self::Shipped,
            "out for delivery" | "out_for_delivery" => Self::OutForDelivery,
            "delivered" => Self::Delivered,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(s),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.to_string()
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    /// Cash on delivery, the only method with a working flow.
    #[default]
    #[serde(rename = "COD", alias = "cod")]
    CashOnDelivery,
    /// Online payment. No gateway is integrated; checkout refuses it.
    #[serde(rename = "online")]
    Online,
}

impl PaymentMethod {
    /// Whether an order can currently be placed with this method.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::CashOnDelivery)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "Cash On Delivery",
            Self::Online => "Online",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cod" | "cash" | "cash-on-delivery" => Ok(Self::CashOnDelivery),
            "online" => Ok(Self::Online),
            other => Err(format!("invalid payment method: {other}")),
        }
    }
}
