//! # Hyperdrive Types Library
//!
//! Fixed-point numeric foundation for the AMM engine.
//!
//! ## Design Philosophy
//!
//! - **On-chain Parity**: 18-decimal scaled integers with the rounding and
//!   overflow behaviour of the pool contracts
//! - **No Precision Loss**: All financial values stored as scaled integers
//! - **Wide Intermediates**: `x * y / d` and the `exp`/`ln` kernels run on
//!   256-bit words, so only final results can overflow
//! - **Clear Boundaries**: Explicit conversion points between floating-point,
//!   `Decimal` and fixed-point
//!
//! ## Quick Start
//!
//! ```rust
//! use types::FixedPoint;
//!
//! let reserves = FixedPoint::from_decimal_str("100000").unwrap();
//! let rate = FixedPoint::from_decimal_str("0.05").unwrap();
//!
//! // Checked arithmetic with explicit rounding
//! let interest = reserves.mul_down(rate).unwrap();
//! assert_eq!(interest, FixedPoint::from_integer(5000));
//!
//! // Curve exponents
//! let grown = FixedPoint::from_decimal_str("1.05").unwrap().pow(rate).unwrap();
//! assert!(grown > FixedPoint::ONE);
//! ```

pub mod common;

pub use common::errors::FixedPointError;
pub use common::fixed_point::FixedPoint;
pub use common::fixed_point_math::{EXP_MAX, EXP_MIN};
