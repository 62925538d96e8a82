//! Order drafts.
//!
//! An [`OrderDraft`] is built once at checkout confirmation and never changed
//! by the client afterwards; status transitions belong to fulfillment.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{CartLedger, CartLine};
use crate::pricing::CheckoutTotals;
use crate::types::{OrderId, OrderStatus, PaymentMethod};

/// Reasons an order draft cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("{} payment is not available yet", .0.label())]
    PaymentMethodUnavailable(PaymentMethod),
}

/// The record appended to a customer's remote order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    id: OrderId,
    items: Vec<CartLine>,
    #[serde(with = "rust_decimal::serde::float")]
    total_amount: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    shipping_fee: Decimal,
    #[serde(default)]
    payment_method: PaymentMethod,
    created_at: DateTime<Utc>,
    #[serde(default)]
    status: OrderStatus,
}

impl OrderDraft {
    /// Snapshot `ledger` into a new order in the initial status.
    ///
    /// `totals` must have been computed from the same ledger.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::EmptyCart`] for an empty ledger and
    /// [`OrderError::PaymentMethodUnavailable`] for methods without a working flow.
    pub fn new(
        id: OrderId,
        ledger: &CartLedger,
        totals: &CheckoutTotals,
        payment_method: PaymentMethod,
        created_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if ledger.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        if !payment_method.is_available() {
            return Err(OrderError::PaymentMethodUnavailable(payment_method));
        }

        Ok(Self {
            id,
            items: ledger.lines().to_vec(),
            total_amount: totals.merchandise,
            shipping_fee: totals.shipping_charged,
            payment_method,
            created_at,
            status: OrderStatus::Processing,
        })
    }

    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }

    #[must_use]
    pub fn items(&self) -> &[CartLine] {
        &self.items
    }

    /// Merchandise total.
    #[must_use]
    pub const fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    #[must_use]
    pub const fn shipping_fee(&self) -> Decimal {
        self.shipping_fee
    }

    /// Merchandise plus shipping.
    #[must_use]
    pub fn payable(&self) -> Decimal {
        self.total_amount + self.shipping_fee
    }

    #[must_use]
    pub const fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn status(&self) -> &OrderStatus {
        &self.status
    }
}

/// Time-based order ids, unique within the process.
///
/// Ids are millisecond timestamps; two submissions in the same millisecond
/// get consecutive values.
#[derive(Debug, Default)]
pub struct OrderIdGenerator {
    last: AtomicI64,
}

impl OrderIdGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Next id for a submission attempted at `now`.
    pub fn next_id(&self, now: DateTime<Utc>) -> OrderId {
        let millis = now.timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(millis.max(last.saturating_add(1)))
            })
            .unwrap_or(millis);
        OrderId::from_millis(millis.max(previous.saturating_add(1)))
    }
}
