//! Signed 256-bit integer over `U256` in two's complement
//!
//! Only what the fixed-point kernels need: wrapping add/sub/mul (identical to
//! the EVM's unchecked `int256` ops), arithmetic shifts and truncating signed
//! division. Values are reinterpreted the same way on-chain words are: bit 255
//! set means negative.

use ethereum_types::U256;
use std::ops::{Add, Mul, Neg, Shl, Shr, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct I256(U256);

impl I256 {
    pub const ZERO: Self = Self(U256([0, 0, 0, 0]));

    /// Build from little-endian 64-bit limbs (two's complement)
    pub const fn from_limbs(limbs: [u64; 4]) -> Self {
        Self(U256(limbs))
    }

    pub fn from_i128(value: i128) -> Self {
        let magnitude = Self(U256::from(value.unsigned_abs()));
        if value < 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Reinterpret an unsigned word as signed
    pub fn from_bits(bits: U256) -> Self {
        Self(bits)
    }

    pub fn into_bits(self) -> U256 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0.bit(255)
    }

    pub fn unsigned_abs(self) -> U256 {
        if self.is_negative() {
            (-self).0
        } else {
            self.0
        }
    }

    /// Signed division truncating toward zero (Solidity `sdiv`)
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.0.is_zero() {
            return None;
        }
        let quotient = Self(self.unsigned_abs() / rhs.unsigned_abs());
        if self.is_negative() != rhs.is_negative() {
            Some(-quotient)
        } else {
            Some(quotient)
        }
    }

    /// Narrow to `i128`, `None` if the value does not fit
    pub fn to_i128(self) -> Option<i128> {
        let magnitude = self.unsigned_abs();
        if magnitude.bits() > 127 {
            // i128::MIN has no positive counterpart
            if self.is_negative() && magnitude == U256::from(i128::MIN.unsigned_abs()) {
                return Some(i128::MIN);
            }
            return None;
        }
        let value = magnitude.low_u128() as i128;
        Some(if self.is_negative() { -value } else { value })
    }
}

impl Neg for I256 {
    type Output = Self;

    fn neg(self) -> Self {
        Self((!self.0).overflowing_add(U256::from(1u64)).0)
    }
}

impl Add for I256 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.overflowing_add(rhs.0).0)
    }
}

impl Sub for I256 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.overflowing_sub(rhs.0).0)
    }
}

impl Mul for I256 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        // low 256 bits of the product are sign-agnostic
        Self(self.0.overflowing_mul(rhs.0).0)
    }
}

impl Shl<usize> for I256 {
    type Output = Self;

    fn shl(self, shift: usize) -> Self {
        Self(self.0 << shift)
    }
}

/// Arithmetic (sign-extending) right shift
impl Shr<usize> for I256 {
    type Output = Self;

    fn shr(self, shift: usize) -> Self {
        if shift >= 256 {
            return if self.is_negative() {
                Self(U256::MAX)
            } else {
                Self::ZERO
            };
        }
        let shifted = self.0 >> shift;
        if self.is_negative() {
            Self(shifted | !(U256::MAX >> shift))
        } else {
            Self(shifted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i128_round_trip() {
        for value in [0i128, 1, -1, 42, -42, i128::MAX, i128::MIN] {
            assert_eq!(I256::from_i128(value).to_i128(), Some(value));
        }
    }

    #[test]
    fn test_wrapping_arithmetic_matches_signed() {
        let a = I256::from_i128(-7);
        let b = I256::from_i128(3);
        assert_eq!((a + b).to_i128(), Some(-4));
        assert_eq!((a - b).to_i128(), Some(-10));
        assert_eq!((a * b).to_i128(), Some(-21));
        assert_eq!((a * a).to_i128(), Some(49));
    }

    #[test]
    fn test_division_truncates_toward_zero() {
        let seven = I256::from_i128(7);
        let two = I256::from_i128(2);
        assert_eq!(seven.checked_div(two).unwrap().to_i128(), Some(3));
        assert_eq!((-seven).checked_div(two).unwrap().to_i128(), Some(-3));
        assert_eq!(seven.checked_div(-two).unwrap().to_i128(), Some(-3));
        assert!(seven.checked_div(I256::ZERO).is_none());
    }

    #[test]
    fn test_arithmetic_shift_right() {
        assert_eq!((I256::from_i128(-8) >> 1).to_i128(), Some(-4));
        assert_eq!((I256::from_i128(-1) >> 10).to_i128(), Some(-1));
        assert_eq!((I256::from_i128(-5) >> 1).to_i128(), Some(-3));
        assert_eq!((I256::from_i128(5) >> 1).to_i128(), Some(2));
        assert_eq!((I256::from_i128(-5) >> 300).to_i128(), Some(-1));
    }

    #[test]
    fn test_narrowing_rejects_wide_values() {
        let wide = I256::from_i128(i128::MAX) << 8;
        assert_eq!(wide.to_i128(), None);
        assert_eq!((-wide).to_i128(), None);
    }
}
