//! Shipping quotes.
//!
//! A quote is either a valid, non-negative fee or the "no charge known" value.
//! The I/O that produces quotes lives in the storefront crate; this module only
//! defines the value and the rules for accepting a rate amount.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::cart::CartLedger;

/// Reasons a rate amount is not accepted as a quote.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    #[error("rate amount is not a finite number")]
    NotFinite,
    #[error("rate amount is negative: {0}")]
    Negative(Decimal),
    #[error("rate amount is not numeric: {0:?}")]
    NotNumeric(String),
}

/// The estimated delivery fee for a destination and parcel weight.
///
/// Invariant: an invalid quote always has a zero cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShippingQuote {
    cost: Decimal,
    valid: bool,
}

impl ShippingQuote {
    /// The fail-soft value: no fee known, nothing charged.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            cost: Decimal::ZERO,
            valid: false,
        }
    }

    /// Accept an exact amount.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::Negative`] for amounts below zero.
    pub fn from_decimal(amount: Decimal) -> Result<Self, QuoteError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(QuoteError::Negative(amount));
        }
        Ok(Self {
            cost: amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            valid: true,
        })
    }

    /// Accept a floating-point amount as returned by JSON rate APIs.
    ///
    /// # Errors
    ///
    /// Returns an error for NaN, infinities and negative amounts.
    pub fn from_f64(amount: f64) -> Result<Self, QuoteError> {
        if !amount.is_finite() {
            return Err(QuoteError::NotFinite);
        }
        let amount = Decimal::from_f64(amount).ok_or(QuoteError::NotFinite)?;
        Self::from_decimal(amount)
    }

    /// Accept an amount sent as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a plain number or is negative.
    pub fn from_amount_str(amount: &str) -> Result<Self, QuoteError> {
        let trimmed = amount.trim();
        let value = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|_| QuoteError::NotNumeric(amount.to_owned()))?;
        Self::from_decimal(value)
    }

    #[must_use]
    pub const fn cost(&self) -> Decimal {
        self.cost
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }
}

/// The inputs a quote was computed for.
///
/// A quote only applies to the cart while the fingerprint still matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteFingerprint {
    pub pincode: String,
    pub weight_grams: u64,
}

impl QuoteFingerprint {
    #[must_use]
    pub fn new(pincode: impl Into<String>, weight_grams: u64) -> Self {
        Self {
            pincode: pincode.into().trim().to_owned(),
            weight_grams,
        }
    }

    /// Fingerprint of a cart shipped to `pincode`.
    #[must_use]
    pub fn for_cart(pincode: &str, ledger: &CartLedger) -> Self {
        Self::new(pincode, ledger.total_weight_grams())
    }

    /// Whether a rate lookup should be attempted at all.
    #[must_use]
    pub fn is_estimable(&self) -> bool {
        !self.pincode.is_empty() && self.weight_grams > 0
    }
}

impl std::fmt::Display for QuoteFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}g", self.pincode, self.weight_grams)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_zero_and_invalid() {
        let quote = ShippingQuote::unavailable();
        assert_eq!(quote.cost(), Decimal::ZERO);
        assert!(!quote.is_valid());
        assert_eq!(ShippingQuote::default(), quote);
    }

    #[test]
    fn test_from_f64_accepts_non_negative() {
        let quote = ShippingQuote::from_f64(87.5).unwrap();
        assert!(quote.is_valid());
        assert_eq!(quote.cost(), Decimal::new(875, 1));
        assert!(ShippingQuote::from_f64(0.0).unwrap().is_valid());
    }

    #[test]
    fn test_from_f64_rejects_bad_amounts() {
        assert_eq!(ShippingQuote::from_f64(f64::NAN), Err(QuoteError::NotFinite));
        assert_eq!(
            ShippingQuote::from_f64(f64::INFINITY),
            Err(QuoteError::NotFinite)
        );
        assert!(matches!(
            ShippingQuote::from_f64(-1.0),
            Err(QuoteError::Negative(_))
        ));
    }

    #[test]
    fn test_from_amount_str() {
        assert_eq!(
            ShippingQuote::from_amount_str(" 120.40 ").unwrap().cost(),
            Decimal::new(12040, 2)
        );
        assert!(matches!(
            ShippingQuote::from_amount_str("n/a"),
            Err(QuoteError::NotNumeric(_))
        ));
        assert!(matches!(
            ShippingQuote::from_amount_str("-3"),
            Err(QuoteError::Negative(_))
        ));
    }

    #[test]
    fn test_fingerprint_estimable() {
        assert!(QuoteFingerprint::new("413512", 1000).is_estimable());
        assert!(!QuoteFingerprint::new("  ", 1000).is_estimable());
        assert!(!QuoteFingerprint::new("413512", 0).is_estimable());
    }

    #[test]
    fn test_fingerprint_for_empty_cart() {
        let fingerprint = QuoteFingerprint::for_cart("413512", &CartLedger::new());
        assert_eq!(fingerprint.weight_grams, 0);
        assert!(!fingerprint.is_estimable());
        assert_eq!(fingerprint.to_string(), "413512@0g");
    }
}
