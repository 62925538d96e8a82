//! Checkout totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartLedger;
use crate::shipping::ShippingQuote;

/// Merchandise total at or above which shipping is free, in rupees.
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: Decimal = Decimal::ONE_THOUSAND;

/// Priced summary of a cart at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutTotals {
    /// Σ price × quantity.
    pub merchandise: Decimal,
    /// Σ savings against compare-at prices.
    pub savings: Decimal,
    /// Fee from the shipping quote, zero when no valid quote exists.
    pub shipping_quoted: Decimal,
    /// Fee actually charged after the free-shipping rule.
    pub shipping_charged: Decimal,
    /// Merchandise plus charged shipping.
    pub payable: Decimal,
}

impl CheckoutTotals {
    /// Price `ledger` with an optional quote.
    ///
    /// Shipping is charged only when the quote is valid and the merchandise
    /// total is strictly below `free_shipping_threshold`.
    #[must_use]
    pub fn compute(
        ledger: &CartLedger,
        quote: Option<&ShippingQuote>,
        free_shipping_threshold: Decimal,
    ) -> Self {
        let merchandise = ledger.net_total();
        let shipping_quoted = quote
            .filter(|q| q.is_valid())
            .map_or(Decimal::ZERO, ShippingQuote::cost);
        let shipping_charged = if merchandise < free_shipping_threshold {
            shipping_quoted
        } else {
            Decimal::ZERO
        };

        Self {
            merchandise,
            savings: ledger.total_savings(),
            shipping_quoted,
            shipping_charged,
            payable: merchandise + shipping_charged,
        }
    }

    /// Whether the free-shipping rule waived a quoted fee.
    #[must_use]
    pub fn shipping_waived(&self) -> bool {
        self.shipping_quoted > Decimal::ZERO && self.shipping_charged.is_zero()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{Product, Variant};
    use crate::types::{LocalizedText, ProductId};

    fn ledger_worth(price: i64) -> CartLedger {
        let variant = Variant::new(
            LocalizedText::en("1kg"),
            Decimal::from(price),
            Decimal::from(price),
        )
        .unwrap();
        let product = Product::new(
            ProductId::new("p1"),
            LocalizedText::en("Urea"),
            "Agro",
            vec![variant.clone()],
        )
        .unwrap();
        let mut ledger = CartLedger::new();
        ledger.add(product, variant);
        ledger
    }

    fn quote(fee: i64) -> ShippingQuote {
        ShippingQuote::from_decimal(Decimal::from(fee)).unwrap()
    }

    #[test]
    fn test_at_threshold_ships_free() {
        let totals = CheckoutTotals::compute(
            &ledger_worth(1000),
            Some(&quote(80)),
            DEFAULT_FREE_SHIPPING_THRESHOLD,
        );
        assert_eq!(totals.payable, Decimal::from(1000));
        assert!(totals.shipping_waived());
    }

    #[test]
    fn test_below_threshold_adds_valid_quote() {
        let totals = CheckoutTotals::compute(
            &ledger_worth(999),
            Some(&quote(80)),
            DEFAULT_FREE_SHIPPING_THRESHOLD,
        );
        assert_eq!(totals.shipping_charged, Decimal::from(80));
        assert_eq!(totals.payable, Decimal::from(1079));
    }

    #[test]
    fn test_below_threshold_without_quote_adds_nothing() {
        let ledger = ledger_worth(400);
        for q in [None, Some(ShippingQuote::unavailable())] {
            let totals =
                CheckoutTotals::compute(&ledger, q.as_ref(), DEFAULT_FREE_SHIPPING_THRESHOLD);
            assert_eq!(totals.payable, Decimal::from(400));
            assert!(!totals.shipping_waived());
        }
    }

    #[test]
    fn test_empty_cart() {
        let totals = CheckoutTotals::compute(
            &CartLedger::new(),
            Some(&quote(50)),
            DEFAULT_FREE_SHIPPING_THRESHOLD,
        );
        assert_eq!(totals.merchandise, Decimal::ZERO);
        assert_eq!(totals.payable, Decimal::from(50));
    }
}
