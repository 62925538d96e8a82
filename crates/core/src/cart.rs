//! The cart ledger.
//!
//! A ledger is an insertion-ordered list of cart lines with at most one line
//! per [`CartKey`]. All totals are derived on read; nothing derived is stored.

use std::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{Product, Variant};
use crate::types::ProductId;
use crate::weight::parse_weight_to_grams;

/// Identity of a cart line: the product id and the variant's English title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CartKey {
    pub product_id: ProductId,
    pub variant_title: String,
}

impl CartKey {
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, variant_title: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            variant_title: variant_title.into(),
        }
    }

    fn matches(&self, line: &CartLine) -> bool {
        line.product.id() == &self.product_id && line.variant.key() == self.variant_title
    }
}

impl std::fmt::Display for CartKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.product_id, self.variant_title)
    }
}

/// One product variant in the cart with its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    product: Product,
    variant: Variant,
    quantity: NonZeroU32,
}

impl CartLine {
    #[must_use]
    pub const fn new(product: Product, variant: Variant, quantity: NonZeroU32) -> Self {
        Self {
            product,
            variant,
            quantity,
        }
    }

    #[must_use]
    pub fn key(&self) -> CartKey {
        CartKey::new(self.product.id().clone(), self.variant.key())
    }

    #[must_use]
    pub const fn product(&self) -> &Product {
        &self.product
    }

    #[must_use]
    pub const fn variant(&self) -> &Variant {
        &self.variant
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity.get()
    }

    /// Price × quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.variant.price() * Decimal::from(self.quantity.get())
    }

    /// Savings against the compare-at price × quantity.
    #[must_use]
    pub fn line_savings(&self) -> Decimal {
        self.variant.unit_savings() * Decimal::from(self.quantity.get())
    }

    /// Parsed variant weight × quantity.
    #[must_use]
    pub fn line_weight_grams(&self) -> u64 {
        parse_weight_to_grams(self.variant.key()).saturating_mul(u64::from(self.quantity.get()))
    }
}

/// The customer's cart.
///
/// Serialized as a bare list of lines. Lines that share a key are merged on
/// load, summing their quantities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartLine>", into = "Vec<CartLine>")]
pub struct CartLedger {
    lines: Vec<CartLine>,
}

impl From<Vec<CartLine>> for CartLedger {
    fn from(lines: Vec<CartLine>) -> Self {
        let mut ledger = Self::new();
        for incoming in lines {
            let key = incoming.key();
            if let Some(line) = ledger.lines.iter_mut().find(|line| key.matches(line)) {
                line.quantity = line.quantity.saturating_add(incoming.quantity.get());
            } else {
                ledger.lines.push(incoming);
            }
        }
        ledger
    }
}

impl From<CartLedger> for Vec<CartLine> {
    fn from(ledger: CartLedger) -> Self {
        ledger.lines
    }
}

impl CartLedger {
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Add one unit of `variant`. Merges into an existing line with the same key.
    pub fn add(&mut self, product: Product, variant: Variant) {
        let key = CartKey::new(product.id().clone(), variant.key());
        if let Some(line) = self.lines.iter_mut().find(|line| key.matches(line)) {
            line.quantity = line.quantity.saturating_add(1);
        } else {
            self.lines
                .push(CartLine::new(product, variant, NonZeroU32::MIN));
        }
    }

    /// Overwrite the quantity of the line for `key`.
    ///
    /// A quantity of zero or less removes the line. Returns whether the ledger
    /// changed; a missing line is a no-op.
    pub fn set_quantity(&mut self, key: &CartKey, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(key);
        }
        let quantity = NonZeroU32::new(u32::try_from(quantity).unwrap_or(u32::MAX))
            .unwrap_or(NonZeroU32::MAX);

        match self.lines.iter_mut().find(|line| key.matches(line)) {
            Some(line) if line.quantity != quantity => {
                line.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Remove the line for `key`. Returns whether a line was removed.
    pub fn remove(&mut self, key: &CartKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| !key.matches(line));
        self.lines.len() != before
    }

    /// Empty the ledger.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, key: &CartKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| key.matches(line))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity())).sum()
    }

    /// Σ price × quantity.
    #[must_use]
    pub fn net_total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Σ max(0, compare-at − price) × quantity.
    #[must_use]
    pub fn total_savings(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_savings).sum()
    }

    /// Σ parsed variant weight × quantity, in grams.
    #[must_use]
    pub fn total_weight_grams(&self) -> u64 {
        self.lines
            .iter()
            .map(CartLine::line_weight_grams)
            .fold(0, u64::saturating_add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::LocalizedText;

    fn variant(title: &str, price: i64, compare_at: i64) -> Variant {
        Variant::new(
            LocalizedText::en(title),
            Decimal::from(price),
            Decimal::from(compare_at),
        )
        .unwrap()
    }

    fn product(id: &str, variants: Vec<Variant>) -> Product {
        Product::new(ProductId::new(id), LocalizedText::en(id), "Agro", variants).unwrap()
    }

    #[test]
    fn test_add_same_key_merges() {
        let v = variant("1kg", 100, 120);
        let p = product("p1", vec![v.clone()]);
        let mut ledger = CartLedger::new();
        for _ in 0..5 {
            ledger.add(p.clone(), v.clone());
        }
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.lines().first().unwrap().quantity(), 5);
    }

    #[test]
    fn test_add_distinct_variants_appends_in_order() {
        let small = variant("500g", 60, 60);
        let large = variant("1kg", 100, 120);
        let p = product("p1", vec![small.clone(), large.clone()]);
        let mut ledger = CartLedger::new();
        ledger.add(p.clone(), large);
        ledger.add(p, small);
        let titles: Vec<_> = ledger.lines().iter().map(|l| l.variant().key()).collect();
        assert_eq!(titles, ["1kg", "500g"]);
    }

    #[test]
    fn test_set_quantity_floor_removes_line() {
        for qty in [0, -1, i64::MIN] {
            let v = variant("1kg", 100, 120);
            let mut ledger = CartLedger::new();
            ledger.add(product("p1", vec![v.clone()]), v);
            assert!(ledger.set_quantity(&CartKey::new("p1", "1kg"), qty));
            assert!(ledger.is_empty(), "qty {qty} should remove the line");
        }
    }

    #[test]
    fn test_set_quantity_overwrites() {
        let v = variant("1kg", 100, 120);
        let mut ledger = CartLedger::new();
        ledger.add(product("p1", vec![v.clone()]), v);
        let key = CartKey::new("p1", "1kg");
        assert!(ledger.set_quantity(&key, 7));
        assert_eq!(ledger.line(&key).unwrap().quantity(), 7);
        assert!(!ledger.set_quantity(&key, 7));
    }

    #[test]
    fn test_set_quantity_missing_line_is_noop() {
        let mut ledger = CartLedger::new();
        assert!(!ledger.set_quantity(&CartKey::new("p1", "1kg"), 3));
        assert!(!ledger.set_quantity(&CartKey::new("p1", "1kg"), 0));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let v = variant("1kg", 100, 120);
        let mut ledger = CartLedger::new();
        ledger.add(product("p1", vec![v.clone()]), v.clone());
        ledger.add(product("p2", vec![v.clone()]), v);
        assert!(ledger.remove(&CartKey::new("p1", "1kg")));
        assert!(!ledger.remove(&CartKey::new("p1", "1kg")));
        assert_eq!(ledger.len(), 1);
        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_totals() {
        let first = variant("1kg", 100, 120);
        let second = variant("250ml", 50, 40);
        let mut ledger = CartLedger::new();
        let p1 = product("p1", vec![first.clone()]);
        ledger.add(p1.clone(), first.clone());
        ledger.add(p1, first);
        ledger.add(product("p2", vec![second.clone()]), second);

        assert_eq!(ledger.net_total(), Decimal::from(250));
        assert_eq!(ledger.total_savings(), Decimal::from(40));
        assert_eq!(ledger.total_weight_grams(), 2250);
        assert_eq!(ledger.item_count(), 3);
    }

    #[test]
    fn test_empty_totals_are_zero() {
        let ledger = CartLedger::new();
        assert_eq!(ledger.net_total(), Decimal::ZERO);
        assert_eq!(ledger.total_savings(), Decimal::ZERO);
        assert_eq!(ledger.total_weight_grams(), 0);
    }

    #[test]
    fn test_serde_roundtrip_preserves_snapshots() {
        let v = variant("1kg", 100, 120).with_inventory(9);
        let mut ledger = CartLedger::new();
        ledger.add(product("p1", vec![v.clone()]), v);
        let json = serde_json::to_string(&ledger).unwrap();
        let restored: CartLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ledger);
    }

    #[test]
    fn test_deserialize_rejects_zero_quantity() {
        let json = serde_json::json!([{
            "product": { "productId": "p1", "productName": { "en": "Neem" } },
            "variant": { "title": { "en": "1kg" }, "price": 10 },
            "quantity": 0
        }]);
        assert!(serde_json::from_value::<CartLedger>(json).is_err());
    }

    #[test]
    fn test_deserialize_merges_duplicate_keys() {
        let line = serde_json::json!({
            "product": { "productId": "p1", "productName": { "en": "Neem" } },
            "variant": { "title": { "en": "1kg" }, "price": 10 },
            "quantity": 2
        });
        let json = serde_json::json!([line.clone(), line]);
        let mut ledger: CartLedger = serde_json::from_value(json).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.item_count(), 4);

        let key = CartKey::new("p1", "1kg");
        assert!(ledger.set_quantity(&key, 5));
        let quantities: Vec<_> = ledger.lines().iter().map(CartLine::quantity).collect();
        assert_eq!(quantities, [5]);
    }
}
