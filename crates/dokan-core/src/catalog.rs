//! # Catalog Index
//!
//! A memoized `product id → Product` lookup, rebuilt once per catalog load.
//! Pricing and checkout take it as a plain input; nothing here fetches.

use std::collections::HashMap;

use crate::types::{LineItem, LineSelection, Product, UnavailableLine};

#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    products: Vec<Product>,
    by_id: HashMap<String, usize>,
}

impl CatalogIndex {
    /// Indexes `products`, keeping catalog order for listing.
    ///
    /// Duplicate ids keep the first occurrence; records with an empty id are
    /// not addressable and are dropped.
    pub fn new(products: Vec<Product>) -> Self {
        let mut kept = Vec::with_capacity(products.len());
        let mut by_id = HashMap::with_capacity(products.len());
        for product in products {
            if product.id.trim().is_empty() || by_id.contains_key(&product.id) {
                continue;
            }
            by_id.insert(product.id.clone(), kept.len());
            kept.push(product);
        }
        Self {
            products: kept,
            by_id,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.by_id.get(id).map(|&i| &self.products[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Joins selections against the catalog.
    ///
    /// Selections with `quantity ≤ 0` are dropped silently. Selections whose
    /// product is gone come back in the second list so callers can flag them
    /// as unavailable.
    pub fn join<I>(&self, selections: I) -> (Vec<LineItem>, Vec<UnavailableLine>)
    where
        I: IntoIterator<Item = LineSelection>,
    {
        let mut items = Vec::new();
        let mut missing = Vec::new();
        for sel in selections {
            if sel.quantity <= 0 {
                continue;
            }
            match self.get(&sel.product_id) {
                Some(product) => items.push(LineItem {
                    product: product.clone(),
                    size: sel.size,
                    quantity: sel.quantity,
                }),
                None => missing.push(sel.into()),
            }
        }
        (items, missing)
    }
}

impl FromIterator<Product> for CatalogIndex {
    fn from_iter<T: IntoIterator<Item = Product>>(iter: T) -> Self {
        CatalogIndex::new(iter.into_iter().collect())
    }
}
