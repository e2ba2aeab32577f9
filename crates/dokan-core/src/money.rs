//! # Money Module
//!
//! Provides the `Money` type for taka amounts.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    1299 * 0.85 = 1104.1499999999999  ❌ WRONG!                          │
//! │                                                                         │
//! │  Discounts are percentages of arbitrary prices, so integer paisa do    │
//! │  not cover every case without rounding mid-calculation.                │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal                                             │
//! │    1299 * 15 / 100 = 194.85 exactly                                    │
//! │    Rounding to 2 places happens ONLY when formatting for display       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use dokan_core::money::Money;
//!
//! let price = Money::from_major(1000);
//! let off = price.percentage(rust_decimal::Decimal::from(10));
//! assert_eq!(price - off, Money::from_major(900));
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Decimal places shown to the customer.
pub const DISPLAY_SCALE: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in the shop currency (taka).
///
/// ## Design Decisions
/// - **Decimal**: exact base-10 arithmetic, no float drift across lines
/// - **Unrounded internally**: every intermediate value keeps full precision
/// - **Serialized as a string**: `"1104.15"` survives any JSON consumer
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► effective unit price ──► line total ──► subtotal     │
/// │                                                              │          │
/// │  Delivery zone fee ─────────────────────────────────────► grand total   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(#[ts(type = "string")] Decimal);

impl Money {
    /// Wraps an exact decimal amount.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a whole-taka amount.
    ///
    /// ```rust
    /// use dokan_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(80).to_string(), "80.00");
    /// ```
    #[inline]
    pub fn from_major(major: i64) -> Self {
        Money(Decimal::from(major))
    }

    /// Returns zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Returns the underlying decimal.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Clamps negative amounts to zero.
    #[inline]
    pub fn clamp_non_negative(self) -> Self {
        if self.is_negative() {
            Money::zero()
        } else {
            self
        }
    }

    /// Multiplies by a line quantity.
    ///
    /// ```rust
    /// use dokan_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(550).multiply_quantity(3), Money::from_major(1650));
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * Decimal::from(qty))
    }

    /// Returns `percent`% of this amount, unrounded.
    ///
    /// ## Example
    /// ```rust
    /// use dokan_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let price = Money::from_major(1299);
    /// assert_eq!(price.percentage(Decimal::from(15)).amount(), Decimal::new(19485, 2));
    /// ```
    pub fn percentage(&self, percent: Decimal) -> Money {
        Money(self.0 * percent / Decimal::ONE_HUNDRED)
    }

    /// Rounds half away from zero to [`DISPLAY_SCALE`] places.
    ///
    /// Only call this at the formatting boundary. Totals must be summed from
    /// unrounded values.
    pub fn rounded(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Lossy conversion for consumers that insist on a JSON number.
    pub fn to_f64(&self) -> f64 {
        self.rounded().0.to_f64().unwrap_or(0.0)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount rounded to two places, without a currency symbol.
///
/// Currency presentation belongs to the app config (`format_currency`).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rounded = self.rounded().0;
        rounded.rescale(DISPLAY_SCALE);
        write!(f, "{}", rounded)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Number Serialization
// =============================================================================

/// Serde adapter for wire fields the backend expects as JSON numbers.
///
/// Serializes the display-rounded amount (an integer when it has no
/// fraction); deserializes numbers or numeric strings, anything else as 0.
///
/// ```rust,ignore
/// #[serde(with = "dokan_core::money::as_number")]
/// pub fee: Money,
/// ```
pub mod as_number {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(money: &Money, s: S) -> Result<S::Ok, S::Error> {
        let rounded = money.rounded().amount();
        if rounded.fract().is_zero() {
            if let Some(whole) = rounded.to_i64() {
                return s.serialize_i64(whole);
            }
        }
        s.serialize_f64(money.to_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Money, D::Error> {
        let value = serde_json::Value::deserialize(de)?;
        Ok(Money::new(crate::types::lenient::decimal_from_value(&value)))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
