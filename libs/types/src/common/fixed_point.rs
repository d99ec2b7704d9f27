//! 18-decimal fixed-point numbers for AMM calculations
//!
//! `FixedPoint` stores values as `i128` scaled by `10^18`, the representation
//! used by the on-chain pool contracts. Multiplication and division go through
//! a full 256-bit product so `x * y / d` never overflows in the middle, and
//! every operation names its rounding direction.
//!
//! ## Design Principles
//!
//! - **No Precision Loss**: Values are scaled integers, never floats
//! - **Overflow Protection**: Checked arithmetic returning `FixedPointError`
//! - **Explicit Rounding**: `*_down` floors, `*_up` ceils
//! - **Clear Boundaries**: `f64` and `Decimal` conversions only at the edges

use crate::common::errors::FixedPointError;
use crate::common::int256::I256;
use ethereum_types::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

/// Signed fixed-point number with 18 decimal places
///
/// Examples:
/// - 1.0 = FixedPoint(1_000_000_000_000_000_000)
/// - 0.05 = FixedPoint(50_000_000_000_000_000)
/// - 1 wei = FixedPoint(1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FixedPoint(i128);

impl FixedPoint {
    /// Number of decimal places
    pub const DECIMALS: u32 = 18;

    /// Scale factor for 18 decimal places
    pub const SCALE: i128 = 1_000_000_000_000_000_000;

    pub const ZERO: Self = Self(0);

    pub const ONE: Self = Self(Self::SCALE);

    /// Smallest positive value (1e-18)
    pub const WEI: Self = Self(1);

    pub const MAX: Self = Self(i128::MAX);

    pub const MIN: Self = Self(i128::MIN);

    /// Create from a decimal string with exact parsing
    ///
    /// This is the PRIMARY method for creating values from external data.
    /// Digits beyond the 18th decimal place are truncated.
    ///
    /// # Examples
    /// ```
    /// use types::FixedPoint;
    ///
    /// let rate = FixedPoint::from_decimal_str("0.05").unwrap();
    /// assert_eq!(rate.raw_value(), 50_000_000_000_000_000);
    /// ```
    pub fn from_decimal_str(s: &str) -> Result<Self, FixedPointError> {
        let decimal = Decimal::from_str(s.trim()).or_else(|_| Decimal::from_scientific(s.trim()));
        let decimal = decimal.map_err(|_| FixedPointError::InvalidDecimal {
            input: s.to_string(),
        })?;
        Self::try_from(decimal)
    }

    /// Create from f64 with safety checks
    ///
    /// Use at boundaries where floating-point values arrive from outside.
    /// Rejects NaN and infinities, rounds to the nearest wei.
    pub fn try_from_f64(value: f64) -> Result<Self, FixedPointError> {
        if !value.is_finite() {
            return Err(FixedPointError::NotFinite { value });
        }
        let scaled = value * Self::SCALE as f64;
        if scaled >= i128::MAX as f64 {
            return Err(FixedPointError::Overflow {
                operation: "try_from_f64",
            });
        }
        if scaled <= i128::MIN as f64 {
            return Err(FixedPointError::Underflow {
                operation: "try_from_f64",
            });
        }
        Ok(Self(scaled.round() as i128))
    }

    /// Convert to f64 for display or logging
    ///
    /// # Warning
    /// Never feed the result back into pool calculations.
    pub fn to_f64(self) -> f64 {
        (self.0 / Self::SCALE) as f64 + (self.0 % Self::SCALE) as f64 / Self::SCALE as f64
    }

    /// Convert to `Decimal`; fails when the raw value exceeds Decimal's 96-bit mantissa
    pub fn to_decimal(self) -> Result<Decimal, FixedPointError> {
        Decimal::try_from_i128_with_scale(self.0, Self::DECIMALS).map_err(|_| {
            FixedPointError::Overflow {
                operation: "to_decimal",
            }
        })
    }

    #[inline]
    pub const fn from_raw(raw: i128) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw_value(self) -> i128 {
        self.0
    }

    /// Create from a whole number (compile-time constant)
    #[inline]
    pub const fn from_integer(value: i64) -> Self {
        Self(value as i128 * Self::SCALE)
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    // CHECKED ARITHMETIC

    /// Checked addition
    pub fn checked_add(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.0.checked_add(rhs.0).map(Self).ok_or({
            if rhs.0 > 0 {
                FixedPointError::Overflow { operation: "add" }
            } else {
                FixedPointError::Underflow { operation: "add" }
            }
        })
    }

    /// Checked subtraction
    pub fn checked_sub(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.0.checked_sub(rhs.0).map(Self).ok_or({
            if rhs.0 < 0 {
                FixedPointError::Overflow { operation: "sub" }
            } else {
                FixedPointError::Underflow { operation: "sub" }
            }
        })
    }

    /// `x * y / d` rounded toward negative infinity, 256-bit intermediate
    pub fn mul_div_down(self, y: Self, d: Self) -> Result<Self, FixedPointError> {
        mul_div(self.0, y.0, d.0, Rounding::Down).map(Self)
    }

    /// `x * y / d` rounded toward positive infinity, 256-bit intermediate
    pub fn mul_div_up(self, y: Self, d: Self) -> Result<Self, FixedPointError> {
        mul_div(self.0, y.0, d.0, Rounding::Up).map(Self)
    }

    pub fn mul_down(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.mul_div_down(rhs, Self::ONE)
    }

    pub fn mul_up(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.mul_div_up(rhs, Self::ONE)
    }

    pub fn div_down(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.mul_div_down(Self::ONE, rhs)
    }

    pub fn div_up(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.mul_div_up(Self::ONE, rhs)
    }

    /// `1 / self` rounded down
    pub fn recip(self) -> Result<Self, FixedPointError> {
        Self::ONE.div_down(self)
    }
}

#[derive(Clone, Copy)]
enum Rounding {
    Down,
    Up,
}

fn mul_div(x: i128, y: i128, d: i128, rounding: Rounding) -> Result<i128, FixedPointError> {
    let operation = match rounding {
        Rounding::Down => "mul_div_down",
        Rounding::Up => "mul_div_up",
    };
    if d == 0 {
        return Err(FixedPointError::DivisionByZero { operation });
    }
    if x == 0 || y == 0 {
        return Ok(0);
    }
    let negative = (x < 0) ^ (y < 0) ^ (d < 0);
    let product = U256::from(x.unsigned_abs()) * U256::from(y.unsigned_abs());
    let (mut quotient, remainder) = product.div_mod(U256::from(d.unsigned_abs()));
    let round_away = match rounding {
        Rounding::Down => negative,
        Rounding::Up => !negative,
    };
    if round_away && !remainder.is_zero() {
        quotient = quotient + U256::from(1u64);
    }
    let signed = if negative {
        -I256::from_bits(quotient)
    } else {
        I256::from_bits(quotient)
    };
    signed
        .to_i128()
        .ok_or_else(|| overflow_or_underflow(negative, operation))
}

fn overflow_or_underflow(negative: bool, operation: &'static str) -> FixedPointError {
    if negative {
        FixedPointError::Underflow { operation }
    } else {
        FixedPointError::Overflow { operation }
    }
}

impl TryFrom<Decimal> for FixedPoint {
    type Error = FixedPointError;

    fn try_from(decimal: Decimal) -> Result<Self, Self::Error> {
        let scale = decimal.scale();
        let mantissa = decimal.mantissa();
        let raw = if scale <= FixedPoint::DECIMALS {
            10i128
                .checked_pow(FixedPoint::DECIMALS - scale)
                .and_then(|factor| mantissa.checked_mul(factor))
        } else {
            Some(mantissa / 10i128.pow(scale - FixedPoint::DECIMALS))
        };
        raw.map(FixedPoint).ok_or_else(|| {
            let value = decimal.to_f64().unwrap_or(f64::NAN);
            if value > 0.0 {
                FixedPointError::Overflow {
                    operation: "from_decimal",
                }
            } else {
                FixedPointError::Underflow {
                    operation: "from_decimal",
                }
            }
        })
    }
}

impl FromStr for FixedPoint {
    type Err = FixedPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal_str(s)
    }
}

/// Exact decimal expansion, trailing zeros trimmed
impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        let scale = Self::SCALE as u128;
        let sign = if self.0 < 0 { "-" } else { "" };
        let whole = magnitude / scale;
        let fraction = magnitude % scale;
        if fraction == 0 {
            return write!(f, "{}{}", sign, whole);
        }
        let digits = format!("{:018}", fraction);
        write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
    }
}

impl Serialize for FixedPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FixedPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let decimal = <Decimal as Deserialize>::deserialize(deserializer)?;
        FixedPoint::try_from(decimal).map_err(serde::de::Error::custom)
    }
}

/// Operator arithmetic, panicking on overflow in debug builds
/// Pricing and state paths use the `checked_*` methods; these are for tests
/// and negating amounts already bounded by validation
impl Add for FixedPoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for FixedPoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for FixedPoint {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}
