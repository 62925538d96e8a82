//! Parcel weight derived from free-text variant labels.
//!
//! Variant titles are written by hand in the catalog ("1kg", "500 GM",
//! "250ml bottle"), so the parser is lenient and never fails: anything it
//! cannot read is billed as one kilogram.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Weight assumed for labels without a recognizable `<number><unit>` token.
///
/// Shipping estimates depend on this value; changing it changes quotes.
pub const FALLBACK_WEIGHT_GRAMS: u64 = 1000;

/// First `<number><unit>` token in a normalized (lowercase, no whitespace) label.
/// Alternation order matters: longer unit spellings must come first.
static WEIGHT_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)(kg|gms|gm|g|ml)").expect("Invalid regex")
});

/// Parse a variant label into grams.
///
/// - `kg` is multiplied by 1000
/// - `g`, `gm`, `gms` are taken as grams
/// - `ml` is taken as grams (unit density)
///
/// The result is rounded to the nearest gram. Labels with no match, or with a
/// number that cannot be represented, yield [`FALLBACK_WEIGHT_GRAMS`].
///
/// ```
/// use krushi_sarthi_core::parse_weight_to_grams;
///
/// assert_eq!(parse_weight_to_grams("2 KG"), 2000);
/// assert_eq!(parse_weight_to_grams("250ml"), 250);
/// assert_eq!(parse_weight_to_grams("garbage"), 1000);
/// ```
#[must_use]
pub fn parse_weight_to_grams(label: &str) -> u64 {
    let normalized: String = label
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let Some(caps) = WEIGHT_TOKEN_RE.captures(&normalized) else {
        return FALLBACK_WEIGHT_GRAMS;
    };
    let (Some(number), Some(unit)) = (caps.get(1), caps.get(2)) else {
        return FALLBACK_WEIGHT_GRAMS;
    };
    let Ok(value) = Decimal::from_str(number.as_str()) else {
        return FALLBACK_WEIGHT_GRAMS;
    };

    let grams = match unit.as_str() {
        "kg" => value.checked_mul(Decimal::ONE_THOUSAND),
        _ => Some(value),
    };

    grams
        .map(|g| g.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|g| g.to_u64())
        .unwrap_or(FALLBACK_WEIGHT_GRAMS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_table() {
        let cases = [
            ("1kg", 1000),
            ("500g", 500),
            ("250ml", 250),
            ("2 KG", 2000),
            ("garbage", 1000),
            ("", 1000),
        ];
        for (label, expected) in cases {
            assert_eq!(parse_weight_to_grams(label), expected, "label: {label:?}");
        }
    }

    #[test]
    fn test_gram_spellings() {
        assert_eq!(parse_weight_to_grams("100gm"), 100);
        assert_eq!(parse_weight_to_grams("100 GMS"), 100);
        assert_eq!(parse_weight_to_grams("Pack of 750 g"), 750);
    }

    #[test]
    fn test_fractional_values_round_to_nearest_gram() {
        assert_eq!(parse_weight_to_grams("1.5kg"), 1500);
        assert_eq!(parse_weight_to_grams("0.0005kg"), 1);
        assert_eq!(parse_weight_to_grams("12.4g"), 12);
        assert_eq!(parse_weight_to_grams("12.5ml"), 13);
    }

    #[test]
    fn test_first_token_wins() {
        assert_eq!(parse_weight_to_grams("2 x 250ml + 1kg free"), 250);
        assert_eq!(parse_weight_to_grams("5kg (2.5g active)"), 5000);
    }

    #[test]
    fn test_unknown_units_fall_back() {
        assert_eq!(parse_weight_to_grams("1 litre"), FALLBACK_WEIGHT_GRAMS);
        assert_eq!(parse_weight_to_grams("10 tablets"), FALLBACK_WEIGHT_GRAMS);
    }

    #[test]
    fn test_unrepresentable_number_falls_back() {
        let label = format!("{}kg", "9".repeat(40));
        assert_eq!(parse_weight_to_grams(&label), FALLBACK_WEIGHT_GRAMS);
    }
}
