//! # Cart State Machine
//!
//! The pure `productId → size → quantity` map behind the cart store.
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  • every stored quantity is ≥ 1                                         │
//! │  • a product with no sizes left is removed entirely                     │
//! │  • iteration order is stable (BTreeMap at both levels)                  │
//! │                                                                         │
//! │  add(p, s, δ)          q[p][s] += δ        (≤ 0 → entry removed)        │
//! │  set_quantity(p, s, n) q[p][s]  = n        (≤ 0 → entry removed)        │
//! │  move_quantity(p, a, b) q[p][b] += q[p][a]; remove q[p][a]              │
//! │  clear()               {}                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation is a single `&mut self` call so the store can apply it as
//! one read-modify-write under its lock. Nothing here knows about the
//! catalog, persistence or the network.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::lenient::quantity_from_value;
use crate::types::{LineSelection, SizeKey};

type SizeMap = BTreeMap<SizeKey, i64>;

/// Cart quantities keyed by product id, then size.
///
/// Serializes to the same `{ "pid": { "M": 2 } }` shape the remote cart uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartItems(BTreeMap<String, SizeMap>);

impl CartItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cart from loosely typed JSON, keeping only well-formed
    /// positive entries.
    ///
    /// Anything that is not an object of objects yields an empty cart. This is
    /// what makes hydration of a corrupt slot harmless.
    pub fn from_value(value: &Value) -> Self {
        let mut cart = CartItems::new();
        let Value::Object(products) = value else {
            return cart;
        };
        for (product_id, sizes) in products {
            if product_id.trim().is_empty() {
                continue;
            }
            let Value::Object(sizes) = sizes else {
                continue;
            };
            for (size, qty) in sizes {
                let qty = quantity_from_value(qty);
                if qty > 0 {
                    cart.add(product_id, SizeKey::new(size), qty);
                }
            }
        }
        cart
    }

    /// Current quantity for `(product_id, size)`, 0 when absent.
    pub fn quantity(&self, product_id: &str, size: &SizeKey) -> i64 {
        self.0
            .get(product_id)
            .and_then(|sizes| sizes.get(size))
            .copied()
            .unwrap_or(0)
    }

    /// Increments `(product_id, size)` by `delta` and returns the new quantity.
    ///
    /// A negative delta that brings the entry to zero or below removes it.
    pub fn add(&mut self, product_id: &str, size: SizeKey, delta: i64) -> i64 {
        let next = self.quantity(product_id, &size).saturating_add(delta);
        self.set_quantity(product_id, size, next);
        next.max(0)
    }

    /// Sets `(product_id, size)` to `quantity`. Returns whether anything changed.
    ///
    /// `quantity ≤ 0` removes the entry and prunes the product when it was
    /// the last size.
    pub fn set_quantity(&mut self, product_id: &str, size: SizeKey, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(product_id, &size) > 0;
        }
        let sizes = self.0.entry(product_id.to_string()).or_default();
        match sizes.insert(size, quantity) {
            Some(previous) => previous != quantity,
            None => true,
        }
    }

    /// Moves all of `from` onto `to` for one product, merging with whatever
    /// `to` already holds. Returns the moved quantity.
    ///
    /// No-op (returns 0) when `from == to` or `from` is empty.
    pub fn move_quantity(&mut self, product_id: &str, from: &SizeKey, to: SizeKey) -> i64 {
        if *from == to {
            return 0;
        }
        let moved = self.remove(product_id, from);
        if moved > 0 {
            self.add(product_id, to, moved);
        }
        moved
    }

    /// Removes one entry, returning the quantity it held.
    fn remove(&mut self, product_id: &str, size: &SizeKey) -> i64 {
        let Some(sizes) = self.0.get_mut(product_id) else {
            return 0;
        };
        let removed = sizes.remove(size).unwrap_or(0);
        if sizes.is_empty() {
            self.0.remove(product_id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of units.
    pub fn count(&self) -> i64 {
        self.0
            .values()
            .flat_map(|sizes| sizes.values())
            .fold(0, |total, qty| total.saturating_add(*qty))
    }

    /// Number of distinct `(product, size)` entries.
    pub fn line_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Ordered snapshot as a flat selection list.
    pub fn lines(&self) -> Vec<LineSelection> {
        self.0
            .iter()
            .flat_map(|(product_id, sizes)| {
                sizes
                    .iter()
                    .map(move |(size, qty)| LineSelection::new(product_id.clone(), size.clone(), *qty))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn m() -> SizeKey {
        SizeKey::from("M")
    }

    fn l() -> SizeKey {
        SizeKey::from("L")
    }

    #[test]
    fn test_add_accumulates() {
        let mut cart = CartItems::new();
        cart.add("p1", m(), 1);
        cart.add("p1", m(), 1);
        assert_eq!(cart.quantity("p1", &m()), 2);
        assert_eq!(cart.count(), 2);
    }

    #[test]
    fn test_count_saturates() {
        let mut cart = CartItems::new();
        cart.add("p1", m(), i64::MAX);
        cart.add("p2", m(), 1);
        cart.add("p1", m(), 1);
        assert_eq!(cart.quantity("p1", &m()), i64::MAX);
        assert_eq!(cart.count(), i64::MAX);
    }

    #[test]
    fn test_update_to_zero_prunes_product() {
        let mut cart = CartItems::new();
        cart.add("p1", m(), 3);
        assert!(cart.set_quantity("p1", m(), 0));
        assert!(cart.is_empty());
        assert_eq!(cart.lines(), vec![]);
    }

    #[test]
    fn test_update_to_zero_keeps_other_sizes() {
        let mut cart = CartItems::new();
        cart.add("p1", m(), 1);
        cart.add("p1", l(), 2);
        cart.set_quantity("p1", m(), -4);
        assert_eq!(cart.quantity("p1", &m()), 0);
        assert_eq!(cart.quantity("p1", &l()), 2);
        assert_eq!(cart.line_count(), 1);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut cart = CartItems::new();
        cart.add("p1", m(), 1);
        assert!(cart.set_quantity("p1", m(), 5));
        let snapshot = cart.clone();
        assert!(!cart.set_quantity("p1", m(), 5));
        assert_eq!(cart, snapshot);
    }

    #[test]
    fn test_negative_add_removes() {
        let mut cart = CartItems::new();
        cart.add("p1", m(), 2);
        assert_eq!(cart.add("p1", m(), -5), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_move_merges_into_target() {
        let mut cart = CartItems::new();
        cart.add("p1", m(), 2);
        cart.add("p1", l(), 1);
        assert_eq!(cart.move_quantity("p1", &m(), l()), 2);
        assert_eq!(cart.quantity("p1", &m()), 0);
        assert_eq!(cart.quantity("p1", &l()), 3);
    }

    #[test]
    fn test_move_round_trip_restores() {
        let mut cart = CartItems::new();
        cart.add("p1", m(), 2);
        cart.add("p2", l(), 1);
        let before = cart.clone();

        cart.move_quantity("p1", &m(), l());
        cart.move_quantity("p1", &l(), m());
        assert_eq!(cart, before);
    }

    #[test]
    fn test_move_noops() {
        let mut cart = CartItems::new();
        cart.add("p1", m(), 2);
        let before = cart.clone();
        assert_eq!(cart.move_quantity("p1", &m(), m()), 0);
        assert_eq!(cart.move_quantity("p1", &l(), m()), 0);
        assert_eq!(cart.move_quantity("nope", &m(), l()), 0);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_lines_are_ordered() {
        let mut cart = CartItems::new();
        cart.add("p2", SizeKey::none(), 1);
        cart.add("p1", l(), 1);
        cart.add("p1", m(), 1);
        let ids: Vec<_> = cart
            .lines()
            .into_iter()
            .map(|s| format!("{}:{}", s.product_id, s.size.as_str()))
            .collect();
        assert_eq!(ids, vec!["p1:L", "p1:M", "p2:"]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut cart = CartItems::new();
        cart.add("p1", m(), 2);
        cart.add("p2", SizeKey::none(), 1);
        let value = serde_json::to_value(&cart).unwrap();
        assert_eq!(value, json!({"p1": {"M": 2}, "p2": {"": 1}}));
        assert_eq!(CartItems::from_value(&value), cart);
    }

    #[test]
    fn test_from_value_drops_garbage() {
        let cart = CartItems::from_value(&json!({
            "p1": {"M": 2, "L": 0, "S": "3", "XL": "x", "XXL": -1},
            "p2": 7,
            "": {"M": 1}
        }));
        assert_eq!(cart.quantity("p1", &m()), 2);
        assert_eq!(cart.quantity("p1", &SizeKey::from("S")), 3);
        assert_eq!(cart.line_count(), 2);

        assert!(CartItems::from_value(&json!("not a cart")).is_empty());
        assert!(CartItems::from_value(&json!([1, 2])).is_empty());
    }
}
