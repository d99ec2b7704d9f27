//! Common numeric types

pub mod errors;
pub mod fixed_point;
pub mod fixed_point_math;
mod int256;
