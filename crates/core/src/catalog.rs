//! Product and variant snapshots.
//!
//! The catalog itself lives in the remote document store; the types here are
//! the validated snapshots a cart line or order carries around. Both types
//! deserialize through an unvalidated record so that malformed documents are
//! rejected at the boundary instead of leaking into the cart.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Locale, LocalizedText, ProductId};

/// Errors raised when a product or variant violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("product id cannot be empty")]
    EmptyProductId,
    #[error("product {0} has no English name")]
    MissingProductName(ProductId),
    #[error("variant has no English title")]
    MissingVariantTitle,
    #[error("variant {title} has a negative {field}")]
    NegativeAmount { title: String, field: &'static str },
    #[error("product {product_id} has duplicate variant title {title:?} ({locale:?})")]
    DuplicateVariantTitle {
        product_id: ProductId,
        locale: Locale,
        title: String,
    },
}

/// A purchasable size or package of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VariantRecord", rename_all = "camelCase")]
pub struct Variant {
    title: LocalizedText,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    compare_at_price: Decimal,
    inventory_quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_default: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantRecord {
    title: LocalizedText,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    compare_at_price: Decimal,
    #[serde(default)]
    inventory_quantity: i64,
    #[serde(default)]
    is_default: Option<bool>,
}

impl TryFrom<VariantRecord> for Variant {
    type Error = CatalogError;

    fn try_from(record: VariantRecord) -> Result<Self, Self::Error> {
        Ok(Self::new(record.title, record.price, record.compare_at_price)?
            .with_inventory(record.inventory_quantity)
            .with_default_flag(record.is_default))
    }
}

impl Variant {
    /// Create a variant.
    ///
    /// # Errors
    ///
    /// Returns an error if the English title is blank or either amount is negative.
    pub fn new(
        title: LocalizedText,
        price: Decimal,
        compare_at_price: Decimal,
    ) -> Result<Self, CatalogError> {
        if title.en.trim().is_empty() {
            return Err(CatalogError::MissingVariantTitle);
        }
        for (field, amount) in [("price", price), ("compare-at price", compare_at_price)] {
            if amount.is_sign_negative() && !amount.is_zero() {
                return Err(CatalogError::NegativeAmount {
                    title: title.en.clone(),
                    field,
                });
            }
        }
        Ok(Self {
            title,
            price,
            compare_at_price,
            inventory_quantity: 0,
            is_default: None,
        })
    }

    #[must_use]
    pub const fn with_inventory(mut self, quantity: i64) -> Self {
        self.inventory_quantity = quantity;
        self
    }

    #[must_use]
    pub const fn with_default_flag(mut self, is_default: Option<bool>) -> Self {
        self.is_default = is_default;
        self
    }

    #[must_use]
    pub const fn title(&self) -> &LocalizedText {
        &self.title
    }

    /// The English title, which is the variant's natural key within its product.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.title.en
    }

    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    #[must_use]
    pub const fn compare_at_price(&self) -> Decimal {
        self.compare_at_price
    }

    #[must_use]
    pub const fn inventory_quantity(&self) -> i64 {
        self.inventory_quantity
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default.unwrap_or(false)
    }

    /// Per-unit saving against the compare-at price, never negative.
    #[must_use]
    pub fn unit_savings(&self) -> Decimal {
        (self.compare_at_price - self.price).max(Decimal::ZERO)
    }

    /// Whole-percent discount against the compare-at price.
    #[must_use]
    pub fn discount_percent(&self) -> Decimal {
        if self.compare_at_price.is_zero() {
            return Decimal::ZERO;
        }
        (self.unit_savings() * Decimal::ONE_HUNDRED / self.compare_at_price).round()
    }
}

/// A catalog product with its purchasable variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProductRecord", rename_all = "camelCase")]
pub struct Product {
    product_id: ProductId,
    product_name: LocalizedText,
    product_description: LocalizedText,
    product_type: LocalizedText,
    product_images: Vec<String>,
    vendor: String,
    show_product: bool,
    is_out_of_stock: bool,
    position: i64,
    chemical_composition: Vec<String>,
    map_variant: Vec<Variant>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductRecord {
    product_id: ProductId,
    product_name: LocalizedText,
    #[serde(default)]
    product_description: LocalizedText,
    #[serde(default)]
    product_type: LocalizedText,
    #[serde(default)]
    product_images: Vec<String>,
    #[serde(default)]
    vendor: String,
    #[serde(default = "default_visible")]
    show_product: bool,
    #[serde(default)]
    is_out_of_stock: bool,
    #[serde(default)]
    position: i64,
    #[serde(default)]
    chemical_composition: Vec<String>,
    #[serde(default)]
    map_variant: Vec<Variant>,
}

const fn default_visible() -> bool {
    true
}

impl TryFrom<ProductRecord> for Product {
    type Error = CatalogError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        let mut product = Self::new(
            record.product_id,
            record.product_name,
            record.vendor,
            record.map_variant,
        )?;
        product.product_description = record.product_description;
        product.product_type = record.product_type;
        product.product_images = record.product_images;
        product.show_product = record.show_product;
        product.is_out_of_stock = record.is_out_of_stock;
        product.position = record.position;
        product.chemical_composition = record.chemical_composition;
        Ok(product)
    }
}

impl Product {
    /// Create a visible, in-stock product.
    ///
    /// # Errors
    ///
    /// Returns an error if the id or English name is blank, or if two variants
    /// share a title in any locale.
    pub fn new(
        product_id: ProductId,
        name: LocalizedText,
        vendor: impl Into<String>,
        variants: Vec<Variant>,
    ) -> Result<Self, CatalogError> {
        if product_id.is_empty() {
            return Err(CatalogError::EmptyProductId);
        }
        if name.en.trim().is_empty() {
            return Err(CatalogError::MissingProductName(product_id));
        }
        check_unique_titles(&product_id, &variants)?;

        Ok(Self {
            product_id,
            product_name: name,
            product_description: LocalizedText::default(),
            product_type: LocalizedText::default(),
            product_images: Vec::new(),
            vendor: vendor.into(),
            show_product: true,
            is_out_of_stock: false,
            position: 0,
            chemical_composition: Vec::new(),
            map_variant: variants,
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: LocalizedText) -> Self {
        self.product_description = description;
        self
    }

    #[must_use]
    pub fn with_type(mut self, product_type: LocalizedText) -> Self {
        self.product_type = product_type;
        self
    }

    #[must_use]
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.product_images = images;
        self
    }

    #[must_use]
    pub fn with_chemical_composition(mut self, composition: Vec<String>) -> Self {
        self.chemical_composition = composition;
        self
    }

    #[must_use]
    pub const fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub const fn with_visibility(mut self, visible: bool) -> Self {
        self.show_product = visible;
        self
    }

    #[must_use]
    pub const fn with_out_of_stock(mut self, out_of_stock: bool) -> Self {
        self.is_out_of_stock = out_of_stock;
        self
    }

    #[must_use]
    pub const fn id(&self) -> &ProductId {
        &self.product_id
    }

    #[must_use]
    pub const fn name(&self) -> &LocalizedText {
        &self.product_name
    }

    #[must_use]
    pub const fn description(&self) -> &LocalizedText {
        &self.product_description
    }

    #[must_use]
    pub const fn product_type(&self) -> &LocalizedText {
        &self.product_type
    }

    #[must_use]
    pub fn images(&self) -> &[String] {
        &self.product_images
    }

    /// The first image, used as the thumbnail in cart and order views.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.product_images.first().map(String::as_str)
    }

    #[must_use]
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.show_product
    }

    #[must_use]
    pub const fn is_out_of_stock(&self) -> bool {
        self.is_out_of_stock
    }

    #[must_use]
    pub const fn position(&self) -> i64 {
        self.position
    }

    #[must_use]
    pub fn chemical_composition(&self) -> &[String] {
        &self.chemical_composition
    }

    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.map_variant
    }

    /// Look up a variant by its English title.
    #[must_use]
    pub fn variant(&self, title: &str) -> Option<&Variant> {
        self.map_variant.iter().find(|v| v.key() == title)
    }

    /// The variant to preselect: the flagged default, otherwise the first one.
    #[must_use]
    pub fn default_variant(&self) -> Option<&Variant> {
        self.map_variant
            .iter()
            .find(|v| v.is_default())
            .or_else(|| self.map_variant.first())
    }
}

fn check_unique_titles(product_id: &ProductId, variants: &[Variant]) -> Result<(), CatalogError> {
    for locale in Locale::ALL {
        let mut seen = HashSet::new();
        for title in variants.iter().filter_map(|v| v.title.raw(locale)) {
            if !seen.insert(title) {
                return Err(CatalogError::DuplicateVariantTitle {
                    product_id: product_id.clone(),
                    locale,
                    title: title.to_owned(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn variant(title: &str, price: i64, compare_at: i64) -> Variant {
        Variant::new(
            LocalizedText::en(title),
            Decimal::from(price),
            Decimal::from(compare_at),
        )
        .unwrap()
    }

    #[test]
    fn test_variant_rejects_blank_title() {
        let result = Variant::new(LocalizedText::en(" "), Decimal::ONE, Decimal::ONE);
        assert_eq!(result, Err(CatalogError::MissingVariantTitle));
    }

    #[test]
    fn test_variant_rejects_negative_price() {
        let result = Variant::new(LocalizedText::en("1kg"), Decimal::NEGATIVE_ONE, Decimal::ONE);
        assert!(matches!(
            result,
            Err(CatalogError::NegativeAmount { field: "price", .. })
        ));
    }

    #[test]
    fn test_unit_savings_never_negative() {
        assert_eq!(variant("1kg", 100, 120).unit_savings(), Decimal::from(20));
        assert_eq!(variant("1kg", 100, 80).unit_savings(), Decimal::ZERO);
        assert_eq!(variant("1kg", 100, 0).discount_percent(), Decimal::ZERO);
        assert_eq!(variant("1kg", 75, 100).discount_percent(), Decimal::from(25));
    }

    #[test]
    fn test_product_rejects_duplicate_titles() {
        let result = Product::new(
            ProductId::new("p1"),
            LocalizedText::en("Neem Oil"),
            "Agro",
            vec![variant("1kg", 100, 120), variant("1kg", 90, 100)],
        );
        assert!(matches!(
            result,
            Err(CatalogError::DuplicateVariantTitle {
                locale: Locale::En,
                ..
            })
        ));
    }

    #[test]
    fn test_product_rejects_duplicate_translated_titles() {
        let mut first = LocalizedText::en("1kg");
        first.mr = Some("१ किलो".to_string());
        let mut second = LocalizedText::en("1 kg pack");
        second.mr = Some("१ किलो".to_string());
        let result = Product::new(
            ProductId::new("p1"),
            LocalizedText::en("Neem Oil"),
            "Agro",
            vec![
                Variant::new(first, Decimal::ONE, Decimal::ONE).unwrap(),
                Variant::new(second, Decimal::ONE, Decimal::ONE).unwrap(),
            ],
        );
        assert!(matches!(
            result,
            Err(CatalogError::DuplicateVariantTitle {
                locale: Locale::Mr,
                ..
            })
        ));
    }

    #[test]
    fn test_product_rejects_blank_id_and_name() {
        assert_eq!(
            Product::new(ProductId::new(""), LocalizedText::en("x"), "", vec![]),
            Err(CatalogError::EmptyProductId)
        );
        assert!(matches!(
            Product::new(ProductId::new("p1"), LocalizedText::en(""), "", vec![]),
            Err(CatalogError::MissingProductName(_))
        ));
    }

    #[test]
    fn test_default_variant_prefers_flag() {
        let product = Product::new(
            ProductId::new("p1"),
            LocalizedText::en("Neem Oil"),
            "Agro",
            vec![
                variant("250ml", 100, 120),
                variant("1l", 300, 350).with_default_flag(Some(true)),
            ],
        )
        .unwrap();
        assert_eq!(product.default_variant().unwrap().key(), "1l");
        assert_eq!(product.variant("250ml").unwrap().price(), Decimal::from(100));
        assert!(product.variant("5l").is_none());
    }

    #[test]
    fn test_deserialize_document_shape() {
        let json = serde_json::json!({
            "productId": "p1",
            "productName": { "en": "Neem Oil", "mr": "कडुनिंब तेल" },
            "productImages": ["https://img/1.jpg"],
            "vendor": "Agro",
            "isOutOfStock": false,
            "mapVariant": [
                { "title": { "en": "500ml" }, "price": 250, "compareAtPrice": 300.5, "inventoryQuantity": 4 }
            ]
        });
        let product: Product = serde_json::from_value(json).unwrap();
        assert!(product.is_visible());
        assert_eq!(product.thumbnail(), Some("https://img/1.jpg"));
        let variant = product.variants().first().unwrap();
        assert_eq!(variant.price(), Decimal::from(250));
        assert_eq!(variant.compare_at_price(), Decimal::new(3005, 1));
        assert_eq!(variant.inventory_quantity(), 4);
    }

    #[test]
    fn test_deserialize_rejects_invalid_document() {
        let json = serde_json::json!({
            "productId": "",
            "productName": { "en": "Neem Oil" },
        });
        assert!(serde_json::from_value::<Product>(json).is_err());
    }
}
