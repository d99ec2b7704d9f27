//! Error types for fixed-point arithmetic
//!
//! Every failure of the 18-decimal arithmetic surfaces as one of these
//! variants: overflow of the storage type, division by zero, an argument
//! outside the approximation domain of `exp`/`ln`, or a bad conversion at the
//! floating-point / decimal boundary.

use thiserror::Error;

/// Errors that can occur during fixed-point arithmetic operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FixedPointError {
    /// Result exceeds the maximum representable value
    #[error("Overflow in {operation}: result exceeds maximum representable value")]
    Overflow { operation: &'static str },

    /// Result is below the minimum representable value
    #[error("Underflow in {operation}: result is below minimum representable value")]
    Underflow { operation: &'static str },

    /// Division by zero in fixed-point arithmetic
    #[error("Division by zero in {operation}")]
    DivisionByZero { operation: &'static str },

    /// Argument outside the domain where the operation is defined
    #[error("{operation}: argument {raw} (raw, 1e18 scale) is outside the valid domain")]
    OutOfDomain { operation: &'static str, raw: i128 },

    /// Invalid decimal string format
    #[error("Invalid decimal string: '{input}' - expected numeric format")]
    InvalidDecimal { input: String },

    /// Value is not finite (NaN or infinity)
    #[error("Value is not finite: {value}")]
    NotFinite { value: f64 },
}
