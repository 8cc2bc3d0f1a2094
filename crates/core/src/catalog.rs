//! Catalog product snapshots used to enrich cart lines.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// A product as listed by the catalog endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    /// Product identifier referenced by cart lines.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price in the store currency's standard unit.
    pub price: Decimal,
    /// Primary image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Whether the product is currently in stock.
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

const fn default_in_stock() -> bool {
    true
}

/// Read access to catalog products by id.
///
/// The catalog is display-only: a miss never blocks a cart operation.
pub trait ProductLookup {
    /// Find a product by id.
    fn product(&self, id: ProductId) -> Option<&CatalogProduct>;
}

impl ProductLookup for [CatalogProduct] {
    fn product(&self, id: ProductId) -> Option<&CatalogProduct> {
        self.iter().find(|p| p.id == id)
    }
}

impl ProductLookup for Vec<CatalogProduct> {
    fn product(&self, id: ProductId) -> Option<&CatalogProduct> {
        self.as_slice().product(id)
    }
}

impl ProductLookup for HashMap<ProductId, CatalogProduct> {
    fn product(&self, id: ProductId) -> Option<&CatalogProduct> {
        self.get(&id)
    }
}
