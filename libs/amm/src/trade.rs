//! Trade quantities and pricing results

use crate::errors::AmmResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use types::FixedPoint;

/// Denomination of a trade amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// The base asset
    Base,
    /// Principal tokens (bonds)
    Pt,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Base => write!(f, "base"),
            TokenType::Pt => write!(f, "pt"),
        }
    }
}

/// An amount tagged with its denomination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub amount: FixedPoint,
    pub unit: TokenType,
}

impl Quantity {
    pub fn new(amount: FixedPoint, unit: TokenType) -> Self {
        Self { amount, unit }
    }

    pub fn base(amount: FixedPoint) -> Self {
        Self::new(amount, TokenType::Base)
    }

    pub fn pt(amount: FixedPoint) -> Self {
        Self::new(amount, TokenType::Pt)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

/// Signed base and bond flows for one side of a trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeDeltas {
    pub d_base: FixedPoint,
    pub d_bonds: FixedPoint,
}

impl TradeDeltas {
    pub fn new(d_base: FixedPoint, d_bonds: FixedPoint) -> Self {
        Self { d_base, d_bonds }
    }
}

/// The four quotes every pricing call reports
///
/// * `without_fee_or_slippage` - spot-price quote
/// * `without_fee` - curve quote including slippage
/// * `fee` - trade and redemption fees, always non-negative
/// * `with_fee` - `without_fee` plus the fee when paying, minus it when receiving
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeBreakdown {
    pub without_fee_or_slippage: FixedPoint,
    pub without_fee: FixedPoint,
    pub fee: FixedPoint,
    pub with_fee: FixedPoint,
}

impl TradeBreakdown {
    /// Field-wise sum of two partial quotes
    pub fn checked_add(self, rhs: Self) -> AmmResult<Self> {
        Ok(Self {
            without_fee_or_slippage: self
                .without_fee_or_slippage
                .checked_add(rhs.without_fee_or_slippage)?,
            without_fee: self.without_fee.checked_add(rhs.without_fee)?,
            fee: self.fee.checked_add(rhs.fee)?,
            with_fee: self.with_fee.checked_add(rhs.with_fee)?,
        })
    }
}

/// Result of a pricing call: flows for the trader, flows for the pool, and
/// the quote breakdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeResult {
    pub user_result: TradeDeltas,
    pub market_result: TradeDeltas,
    pub breakdown: TradeBreakdown,
}

/// Result of a liquidity calculation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpQuote {
    pub lp_tokens: FixedPoint,
    pub d_base: FixedPoint,
    pub d_bonds: FixedPoint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn breakdown(value: i64) -> TradeBreakdown {
        let value = FixedPoint::from_integer(value);
        TradeBreakdown {
            without_fee_or_slippage: value,
            without_fee: value,
            fee: value,
            with_fee: value,
        }
    }

    #[test]
    fn test_breakdown_checked_add() {
        assert_eq!(breakdown(2).checked_add(breakdown(3)).unwrap(), breakdown(5));

        let huge = TradeBreakdown {
            fee: FixedPoint::from_raw(i128::MAX),
            ..breakdown(0)
        };
        let err = huge.checked_add(breakdown(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
    }
}
