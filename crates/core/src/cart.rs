//! Cart line items, display enrichment and derived pricing.
//!
//! The server owns line items; everything here is derived from the latest
//! fetched collection and recomputed on demand. Nothing in this module is
//! persisted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::ProductLookup;
use crate::types::{CartLineId, ProductId, Quantity};

/// Placeholder shown for lines whose product is missing from the catalog.
pub const UNAVAILABLE_LABEL: &str = "Unavailable";

/// One row of the server-side cart.
///
/// The server enforces at most one line per product per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Server-assigned line id.
    pub id: CartLineId,
    /// Referenced product.
    pub product: ProductId,
    /// Units of the product, at least one.
    pub quantity: Quantity,
}

/// Total number of units across all lines.
#[must_use]
pub fn cart_count(lines: &[CartLineItem]) -> u64 {
    lines.iter().map(|l| u64::from(l.quantity.get())).sum()
}

/// Find the line holding `product`, if any.
#[must_use]
pub fn find_line(lines: &[CartLineItem], product: ProductId) -> Option<&CartLineItem> {
    lines.iter().find(|l| l.product == product)
}

/// Display data copied from the catalog for one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub unit_price: Decimal,
    pub image: Option<String>,
}

/// A cart line joined with its catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedCartItem {
    pub line: CartLineItem,
    /// `None` when the catalog does not know the product.
    pub product: Option<ProductSnapshot>,
}

impl EnrichedCartItem {
    /// Whether catalog data was found for this line.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.product.is_some()
    }

    /// Product name, or [`UNAVAILABLE_LABEL`].
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.product
            .as_ref()
            .map_or(UNAVAILABLE_LABEL, |p| p.name.as_str())
    }

    /// Unit price, if known.
    #[must_use]
    pub fn unit_price(&self) -> Option<Decimal> {
        self.product.as_ref().map(|p| p.unit_price)
    }

    /// Unit price times quantity, if the price is known.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price()
            .map(|price| price * Decimal::from(self.line.quantity.get()))
    }
}

/// Join cart lines with catalog data, preserving line order.
#[must_use]
pub fn enrich<L>(lines: &[CartLineItem], catalog: &L) -> Vec<EnrichedCartItem>
where
    L: ProductLookup + ?Sized,
{
    lines
        .iter()
        .map(|line| EnrichedCartItem {
            line: *line,
            product: catalog.product(line.product).map(|p| ProductSnapshot {
                name: p.name.clone(),
                unit_price: p.price,
                image: p.image.clone(),
            }),
        })
        .collect()
}

/// Flat-rate shipping waived above a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Fee charged below the threshold.
    pub flat_fee: Decimal,
    /// Pre-discount subtotal at which shipping becomes free.
    pub free_shipping_threshold: Decimal,
}

impl ShippingPolicy {
    /// Shipping charged for a cart with the given pre-discount subtotal.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal, item_count: u64) -> Decimal {
        if item_count == 0 || subtotal >= self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.flat_fee
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            flat_fee: Decimal::new(99, 0),
            free_shipping_threshold: Decimal::new(999, 0),
        }
    }
}

/// Derived totals for the current cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub item_count: u64,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl CartSummary {
    /// Compute totals from enriched items and an already-evaluated discount.
    ///
    /// Items with unknown prices contribute nothing to the subtotal. The
    /// discounted amount never drops below zero; shipping is added after.
    #[must_use]
    pub fn compute(items: &[EnrichedCartItem], discount: Decimal, policy: &ShippingPolicy) -> Self {
        let item_count = items
            .iter()
            .map(|i| u64::from(i.line.quantity.get()))
            .sum();
        let subtotal: Decimal = items.iter().filter_map(EnrichedCartItem::line_total).sum();
        let discount = discount.max(Decimal::ZERO);
        let shipping = policy.shipping_for(subtotal, item_count);
        let total = (subtotal - discount).max(Decimal::ZERO) + shipping;

        Self {
            item_count,
            subtotal,
            discount,
            shipping,
            total,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::catalog::CatalogProduct;

    fn line(id: i64, product: i64, quantity: u32) -> CartLineItem {
        CartLineItem {
            id: CartLineId::new(id),
            product: ProductId::new(product),
            quantity: Quantity::new(quantity).unwrap(),
        }
    }

    fn product(id: i64, name: &str, price: i64) -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Decimal::new(price, 0),
            image: Some(format!("https://cdn.lustre.example/{id}.jpg")),
            in_stock: true,
        }
    }

    #[test]
    fn test_empty_cart_count_is_zero() {
        assert_eq!(cart_count(&[]), 0);
    }

    #[test]
    fn test_find_line_by_product() {
        let lines = [line(1, 10, 1), line(2, 11, 3)];
        assert_eq!(find_line(&lines, ProductId::new(11)).unwrap().id, CartLineId::new(2));
        assert!(find_line(&lines, ProductId::new(12)).is_none());
    }

    #[test]
    fn test_line_deserializes_from_api_shape() {
        let parsed: CartLineItem =
            serde_json::from_str(r#"{"id": 9, "product": 4, "quantity": 2}"#).unwrap();
        assert_eq!(parsed, line(9, 4, 2));
    }

    #[test]
    fn test_enrich_falls_back_for_unknown_products() {
        let catalog = vec![product(10, "Solitaire Ring", 15_000)];
        let items = enrich(&[line(1, 10, 2), line(2, 99, 1)], &catalog);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].display_name(), "Solitaire Ring");
        assert_eq!(items[0].line_total(), Some(Decimal::new(30_000, 0)));
        assert!(!items[1].is_available());
        assert_eq!(items[1].display_name(), UNAVAILABLE_LABEL);
        assert_eq!(items[1].line_total(), None);
    }

    #[test]
    fn test_summary_skips_unavailable_and_applies_shipping() {
        let catalog = vec![product(10, "Silver Anklet", 450)];
        let items = enrich(&[line(1, 10, 1), line(2, 99, 4)], &catalog);
        let summary = CartSummary::compute(&items, Decimal::ZERO, &ShippingPolicy::default());

        assert_eq!(summary.item_count, 5);
        assert_eq!(summary.subtotal, Decimal::new(450, 0));
        assert_eq!(summary.shipping, Decimal::new(99, 0));
        assert_eq!(summary.total, Decimal::new(549, 0));
    }

    #[test]
    fn test_summary_free_shipping_and_discount_floor() {
        let catalog = vec![product(10, "Emerald Pendant", 1_000)];
        let items = enrich(&[line(1, 10, 1)], &catalog);
        let summary =
            CartSummary::compute(&items, Decimal::new(5_000, 0), &ShippingPolicy::default());

        assert_eq!(summary.shipping, Decimal::ZERO);
        assert_eq!(summary.total, Decimal::ZERO);
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let summary = CartSummary::compute(&[], Decimal::ZERO, &ShippingPolicy::default());
        assert_eq!(summary.total, Decimal::ZERO);
        assert_eq!(summary.item_count, 0);
    }

    proptest! {
        #[test]
        fn count_equals_sum_of_quantities(quantities in proptest::collection::vec(1u32..50, 0..20)) {
            let lines: Vec<CartLineItem> = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| {
                    let i = i64::try_from(i).unwrap();
                    line(i, i + 100, *q)
                })
                .collect();
            let expected: u64 = quantities.iter().map(|q| u64::from(*q)).sum();
            prop_assert_eq!(cart_count(&lines), expected);
        }
    }
}
