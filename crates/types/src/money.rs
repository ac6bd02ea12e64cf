//! Fixed-point monetary types for the trading arena.
//!
//! This module provides type-safe representations for prices, cash amounts,
//! and item quantities. All values use fixed-point arithmetic with 4 decimal
//! places to avoid floating-point precision issues in the ledger and the
//! matcher. Quantities share the same scale so fractional order sizes are
//! exact.

use crate::ids::PRICE_SCALE;
use derive_more::{Add, AddAssign, From, Into, Neg, Sub, SubAssign, Sum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Mul;

// =============================================================================
// Quantity Type
// =============================================================================

/// Item quantity, fixed-point with 4 decimal places.
///
/// `Quantity(15_000)` = 1.5 units, `Quantity(10_000)` = 1 unit.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    Sub,
    AddAssign,
    SubAssign,
    Sum,
    From,
    Into,
)]
pub struct Quantity(pub u64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    /// Create a Quantity from a floating-point value.
    #[inline]
    pub fn from_float(v: f64) -> Self {
        Self((v * PRICE_SCALE as f64).round() as u64)
    }

    /// Convert to floating-point for display/calculations.
    #[inline]
    pub fn to_float(self) -> f64 {
        self.0 as f64 / PRICE_SCALE as f64
    }

    /// Get raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Check if zero.
    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating subtraction.
    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Quantity(self.0.saturating_sub(rhs.0))
    }

    /// Minimum of two quantities.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Quantity(self.0.min(other.0))
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qty({})", self.to_float())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_float())
    }
}

// =============================================================================
// Fixed-Point Price Type
// =============================================================================

/// Fixed-point price with 4 decimal places.
///
/// # Examples
/// - `Price(10000)` = $1.00
/// - `Price(15000)` = $1.50
/// - `Price(100)` = $0.01
/// - `Price(1)` = $0.0001
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    Sub,
    Neg,
    AddAssign,
    SubAssign,
    From,
    Into,
)]
pub struct Price(pub i64);

impl Price {
    pub const ZERO: Price = Price(0);

    /// Hard lower bound for simulated prices: $0.01.
    pub const FLOOR: Price = Price(100);

    /// Create a Price from a floating-point value.
    #[inline]
    pub fn from_float(v: f64) -> Self {
        Self((v * PRICE_SCALE as f64).round() as i64)
    }

    /// Convert to floating-point for display/calculations.
    #[inline]
    pub fn to_float(self) -> f64 {
        self.0 as f64 / PRICE_SCALE as f64
    }

    /// Raw internal value.
    #[inline]
    pub fn raw(self) -> i64 {
        self.0
    }

    /// Check if price is positive.
    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price(${:.4})", self.to_float())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.4}", self.to_float())
    }
}

// =============================================================================
// Fixed-Point Cash Type
// =============================================================================

/// Fixed-point cash/money with 4 decimal places.
///
/// Semantically identical to Price but represents account balances.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    Sub,
    Neg,
    AddAssign,
    SubAssign,
    Sum,
    From,
    Into,
)]
pub struct Cash(pub i64);

impl Cash {
    pub const ZERO: Cash = Cash(0);

    /// Create Cash from a floating-point value.
    #[inline]
    pub fn from_float(v: f64) -> Self {
        Self((v * PRICE_SCALE as f64).round() as i64)
    }

    /// Convert to floating-point for display/calculations.
    #[inline]
    pub fn to_float(self) -> f64 {
        self.0 as f64 / PRICE_SCALE as f64
    }

    /// Raw internal value.
    #[inline]
    pub fn raw(self) -> i64 {
        self.0
    }

    /// Check if cash is positive.
    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Check if cash is negative.
    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Debug for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cash(${:.4})", self.to_float())
    }
}

impl fmt::Display for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.4}", self.to_float())
    }
}

// =============================================================================
// Price-Quantity Operations
// =============================================================================

impl Mul<Quantity> for Price {
    type Output = Cash;

    /// Multiply price by quantity to get total cash value.
    ///
    /// Both operands carry the fixed-point scale, so the product is divided
    /// by the scale once (i128 intermediate to avoid overflow).
    fn mul(self, qty: Quantity) -> Cash {
        Cash((self.0 as i128 * qty.0 as i128 / PRICE_SCALE as i128) as i64)
    }
}

impl Mul<Price> for Quantity {
    type Output = Cash;

    fn mul(self, price: Price) -> Cash {
        price * self
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_from_float() {
        assert_eq!(Price::from_float(1.0), Price(10_000));
        assert_eq!(Price::from_float(1.50), Price(15_000));
        assert_eq!(Price::from_float(0.01), Price(100));
        assert_eq!(Price::from_float(0.01), Price::FLOOR);
    }

    #[test]
    fn test_quantity_from_float() {
        assert_eq!(Quantity::from_float(1.5), Quantity(15_000));
        assert_eq!(Quantity::from_float(100.0), Quantity(1_000_000));
        assert!((Quantity::from_float(0.25).to_float() - 0.25).abs() < 1e-10);
    }

    #[test]
    fn test_price_arithmetic() {
        let p1 = Price::from_float(10.0);
        let p2 = Price::from_float(3.5);

        assert_eq!((p1 + p2).to_float(), 13.5);
        assert_eq!((p1 - p2).to_float(), 6.5);
    }

    #[test]
    fn test_price_quantity_multiplication() {
        let price = Price::from_float(50.0);
        let quantity = Quantity::from_float(100.0);

        let total = price * quantity;
        assert_eq!(total.to_float(), 5000.0);
    }

    #[test]
    fn test_fractional_quantity_value() {
        // 1.5 units at $49,900 = $74,850
        let price = Price::from_float(49_900.0);
        let quantity = Quantity::from_float(1.5);

        assert_eq!((price * quantity).to_float(), 74_850.0);
    }

    #[test]
    fn test_cash_operations() {
        let c1 = Cash::from_float(1000.0);
        let c2 = Cash::from_float(250.0);

        assert_eq!((c1 - c2).to_float(), 750.0);
        assert!(c1.is_positive());
        assert!(!c1.is_negative());
    }

    #[test]
    fn test_quantity_saturating_sub() {
        let q1 = Quantity::from_float(1.0);
        let q2 = Quantity::from_float(2.5);

        assert_eq!(q1.saturating_sub(q2), Quantity::ZERO);
        assert_eq!(q2.saturating_sub(q1), Quantity::from_float(1.5));
    }
}
