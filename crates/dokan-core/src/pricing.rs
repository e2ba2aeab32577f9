//! # Pricing Engine
//!
//! The single place where discount, oversize surcharge and totals are
//! computed. Cart display, checkout display and the order payload all go
//! through [`PricingEngine`].
//!
//! ## Price Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Product.price ──► effective_unit_price ──┐                             │
//! │  (discount %)       max(0, p - p*d/100)   │                             │
//! │                                           ├─► × qty ──► line_total      │
//! │  size label ──► size_surcharge ───────────┘                │            │
//! │  ("XXL..." → 50)                                           ▼            │
//! │                                                       aggregate         │
//! │                                                  subtotal, savings,     │
//! │                                                  surcharge              │
//! │                                                            │            │
//! │  delivery fee ──────────────────────────────────► grand_total           │
//! │                                          (0 when subtotal is 0)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here is pure. Rounding never happens here; see
//! [`Money::rounded`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{LineItem, PricingResult, Product, SizeKey};

/// Default per-unit surcharge for oversize labels, in taka.
pub const OVERSIZE_SURCHARGE: i64 = 50;

/// Size labels starting with this prefix (case-insensitive) are oversize.
pub const OVERSIZE_PREFIX: &str = "XXL";

// =============================================================================
// Pricing Policy
// =============================================================================

/// The business constants pricing depends on.
///
/// Defaults are the shop's current policy; the app config can override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    /// Added to the unit price of every oversize unit.
    pub oversize_surcharge: Money,
    /// Label prefix that marks a size as oversize.
    pub oversize_prefix: String,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            oversize_surcharge: Money::from_major(OVERSIZE_SURCHARGE),
            oversize_prefix: OVERSIZE_PREFIX.to_string(),
        }
    }
}

impl PricingPolicy {
    /// Whether `size` falls in the oversize classification.
    pub fn is_oversize(&self, size: &SizeKey) -> bool {
        let prefix = self.oversize_prefix.trim();
        !prefix.is_empty()
            && size
                .as_str()
                .to_uppercase()
                .starts_with(&prefix.to_uppercase())
    }
}

// =============================================================================
// Pricing Engine
// =============================================================================

/// Per-line breakdown for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineBreakdown {
    pub unit_price: Money,
    pub surcharge: Money,
    pub savings: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    policy: PricingPolicy,
}

impl PricingEngine {
    pub fn new(policy: PricingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// Base price after the discount percentage, floored at zero.
    ///
    /// ## Example
    /// ```rust
    /// use dokan_core::pricing::PricingEngine;
    /// use dokan_core::{Money, Product};
    /// use rust_decimal::Decimal;
    ///
    /// let engine = PricingEngine::default();
    /// let p = Product::new("p1", "Panjabi", Money::from_major(1000))
    ///     .with_discount(Decimal::from(10));
    /// assert_eq!(engine.effective_unit_price(&p), Money::from_major(900));
    /// ```
    pub fn effective_unit_price(&self, product: &Product) -> Money {
        if product.discount <= Decimal::ZERO {
            return product.price;
        }
        (product.price - product.price.percentage(product.discount)).clamp_non_negative()
    }

    /// Fixed surcharge for oversize labels, zero otherwise.
    pub fn size_surcharge(&self, size: &SizeKey) -> Money {
        if self.policy.is_oversize(size) {
            self.policy.oversize_surcharge
        } else {
            Money::zero()
        }
    }

    /// `(effective unit price + surcharge) × quantity`; zero for `quantity ≤ 0`.
    pub fn line_total(&self, product: &Product, size: &SizeKey, quantity: i64) -> Money {
        self.line_breakdown(product, size, quantity).line_total
    }

    /// Everything a receipt line shows.
    pub fn line_breakdown(&self, product: &Product, size: &SizeKey, quantity: i64) -> LineBreakdown {
        let unit_price = self.effective_unit_price(product);
        let surcharge = self.size_surcharge(size);
        if quantity <= 0 {
            return LineBreakdown {
                unit_price,
                surcharge,
                ..LineBreakdown::default()
            };
        }

        let savings = if product.discount > Decimal::ZERO {
            (product.price - unit_price).multiply_quantity(quantity)
        } else {
            Money::zero()
        };

        LineBreakdown {
            unit_price,
            surcharge,
            savings,
            line_total: (unit_price + surcharge).multiply_quantity(quantity),
        }
    }

    /// Folds line items into subtotal, savings and surcharge totals.
    ///
    /// The delivery fee is left at zero; use [`PricingEngine::totals`] to
    /// price a checkout.
    pub fn aggregate<'a, I>(&self, lines: I) -> PricingResult
    where
        I: IntoIterator<Item = &'a LineItem>,
    {
        let mut result = PricingResult::default();
        for line in lines {
            if line.quantity <= 0 {
                continue;
            }
            let b = self.line_breakdown(&line.product, &line.size, line.quantity);
            result.subtotal += b.line_total;
            result.total_savings += b.savings;
            result.total_surcharge += b.surcharge.multiply_quantity(line.quantity);
        }
        result.grand_total = self.grand_total(result.subtotal, Money::zero());
        result
    }

    /// Subtotal plus delivery, except an empty order totals zero.
    pub fn grand_total(&self, subtotal: Money, delivery_fee: Money) -> Money {
        if subtotal.is_zero() {
            Money::zero()
        } else {
            subtotal + delivery_fee
        }
    }

    /// `aggregate` + `grand_total` in one step.
    pub fn totals<'a, I>(&self, lines: I, delivery_fee: Money) -> PricingResult
    where
        I: IntoIterator<Item = &'a LineItem>,
    {
        let mut result = self.aggregate(lines);
        result.delivery_fee = delivery_fee;
        result.grand_total = self.grand_total(result.subtotal, delivery_fee);
        result
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: Product, size: &str, quantity: i64) -> LineItem {
        LineItem {
            product,
            size: SizeKey::from(size),
            quantity,
        }
    }

    fn panjabi() -> Product {
        Product::new("p1", "Panjabi", Money::from_major(1000))
            .with_discount(Decimal::from(10))
            .with_sizes(["M", "L"])
    }

    fn tee() -> Product {
        Product::new("p2", "Tee", Money::from_major(500)).with_sizes(["L", "XXL-46"])
    }

    #[test]
    fn test_discounted_line() {
        let engine = PricingEngine::default();
        let result = engine.aggregate(&[line(panjabi(), "M", 2)]);

        assert_eq!(engine.effective_unit_price(&panjabi()), Money::from_major(900));
        assert_eq!(result.subtotal, Money::from_major(1800));
        assert_eq!(result.total_savings, Money::from_major(200));
        assert_eq!(result.total_surcharge, Money::zero());
    }

    #[test]
    fn test_oversize_line() {
        let engine = PricingEngine::default();
        let result = engine.aggregate(&[line(tee(), "XXL-46", 1)]);

        assert_eq!(engine.size_surcharge(&SizeKey::from("XXL-46")), Money::from_major(50));
        assert_eq!(result.subtotal, Money::from_major(550));
        assert_eq!(result.total_surcharge, Money::from_major(50));
        assert_eq!(result.total_savings, Money::zero());
    }

    #[test]
    fn test_oversize_prefix_is_case_insensitive() {
        let engine = PricingEngine::default();
        assert_eq!(engine.size_surcharge(&SizeKey::from("xxl")), Money::from_major(50));
        assert_eq!(engine.size_surcharge(&SizeKey::from("XL")), Money::zero());
        assert_eq!(engine.size_surcharge(&SizeKey::none()), Money::zero());
    }

    #[test]
    fn test_surcharge_sums_per_unit() {
        let engine = PricingEngine::default();
        let result = engine.aggregate(&[line(tee(), "XXL-46", 3), line(tee(), "L", 2)]);

        assert_eq!(result.total_surcharge, Money::from_major(150));
        assert_eq!(result.subtotal, Money::from_major(550 * 3 + 500 * 2));
    }

    #[test]
    fn test_discount_over_100_clamps_to_zero() {
        let engine = PricingEngine::default();
        let p = Product::new("p3", "Free", Money::from_major(300)).with_discount(Decimal::from(150));
        assert_eq!(engine.effective_unit_price(&p), Money::zero());
    }

    #[test]
    fn test_negative_discount_ignored() {
        let engine = PricingEngine::default();
        let p = Product::new("p4", "Odd", Money::from_major(300)).with_discount(Decimal::from(-5));
        assert_eq!(engine.effective_unit_price(&p), Money::from_major(300));
        assert_eq!(engine.line_breakdown(&p, &SizeKey::none(), 1).savings, Money::zero());
    }

    #[test]
    fn test_effective_price_never_exceeds_base() {
        let engine = PricingEngine::default();
        for d in [1, 5, 33, 50, 99, 100] {
            let p = Product::new("p", "x", Money::from_major(777)).with_discount(Decimal::from(d));
            let eff = engine.effective_unit_price(&p);
            assert!(eff <= p.price);
            assert!(!eff.is_negative());
        }
    }

    #[test]
    fn test_non_positive_quantity_is_absent() {
        let engine = PricingEngine::default();
        assert_eq!(engine.line_total(&panjabi(), &SizeKey::from("M"), 0), Money::zero());
        assert_eq!(engine.line_total(&panjabi(), &SizeKey::from("M"), -2), Money::zero());

        let result = engine.aggregate(&[line(tee(), "XXL-46", -1)]);
        assert_eq!(result, PricingResult::default());
    }

    #[test]
    fn test_empty_order_grand_total_is_zero() {
        let engine = PricingEngine::default();
        let result = engine.totals(&Vec::<LineItem>::new(), Money::from_major(150));

        assert_eq!(result.grand_total, Money::zero());
        assert_eq!(result.delivery_fee, Money::from_major(150));
    }

    #[test]
    fn test_grand_total_adds_delivery() {
        let engine = PricingEngine::default();
        let result = engine.totals(&[line(panjabi(), "M", 2)], Money::from_major(80));
        assert_eq!(result.grand_total, Money::from_major(1880));
    }

    #[test]
    fn test_custom_policy() {
        let engine = PricingEngine::new(PricingPolicy {
            oversize_surcharge: Money::from_major(70),
            oversize_prefix: "3XL".into(),
        });
        assert_eq!(engine.size_surcharge(&SizeKey::from("3xl")), Money::from_major(70));
        assert_eq!(engine.size_surcharge(&SizeKey::from("XXL")), Money::zero());
    }

    #[test]
    fn test_unrounded_until_display() {
        let engine = PricingEngine::default();
        // 333 at 33.33% off = 222.0111 per unit; 3 units = 666.0333
        let p = Product::new("p5", "Odd", Money::from_major(333)).with_discount(Decimal::new(3333, 2));
        let result = engine.aggregate(&[line(p, "", 3)]);
        assert_eq!(result.subtotal.amount(), Decimal::new(6660333, 4));
        assert_eq!(result.subtotal.to_string(), "666.03");
    }
}
