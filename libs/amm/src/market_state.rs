//! Reserve ledger of the pool and its only transition, `apply_delta`
//!
//! ## Design Principles
//!
//! - **Pure Transitions**: `apply_delta` returns a new, checked state and
//!   leaves the input untouched
//! - **Precision Noise Is Not An Error**: values within
//!   [`PRECISION_THRESHOLD`] below zero snap to exactly zero
//! - **Enumerated Fields**: `fields()` lists every value in a fixed order for
//!   diffing and logging

use crate::errors::{AmmError, AmmResult};
use serde::{Deserialize, Serialize};
use std::ops::Neg;
use tracing::debug;
use types::FixedPoint;

/// 1e-8
pub const PRECISION_THRESHOLD: FixedPoint = FixedPoint::from_raw(10_000_000_000);

/// 2e10, largest allowed gap between `z * c` and `y` for a priced trade
pub const MAX_RESERVES_DIFFERENCE: FixedPoint =
    FixedPoint::from_raw(20_000_000_000 * FixedPoint::SCALE);

/// Pool reserves, buffers and fee parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    /// Share reserves `z`
    pub share_reserves: FixedPoint,
    /// Bond reserves `y`
    pub bond_reserves: FixedPoint,
    /// Base set aside for open longs
    pub base_buffer: FixedPoint,
    /// Bonds set aside for open shorts
    pub bond_buffer: FixedPoint,
    pub lp_total_supply: FixedPoint,
    /// Share price `c`
    pub share_price: FixedPoint,
    /// Share price `mu` when the pool opened
    pub init_share_price: FixedPoint,
    pub trade_fee_percent: FixedPoint,
    pub redemption_fee_percent: FixedPoint,
    pub variable_apr: FixedPoint,
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            share_reserves: FixedPoint::ZERO,
            bond_reserves: FixedPoint::ZERO,
            base_buffer: FixedPoint::ZERO,
            bond_buffer: FixedPoint::ZERO,
            lp_total_supply: FixedPoint::ZERO,
            share_price: FixedPoint::ONE,
            init_share_price: FixedPoint::ONE,
            trade_fee_percent: FixedPoint::ZERO,
            redemption_fee_percent: FixedPoint::ZERO,
            variable_apr: FixedPoint::ZERO,
        }
    }
}

impl MarketState {
    /// Empty pool at the given share price with the given fees
    pub fn empty(
        share_price: FixedPoint,
        trade_fee_percent: FixedPoint,
        redemption_fee_percent: FixedPoint,
    ) -> Self {
        Self {
            share_price,
            init_share_price: share_price,
            trade_fee_percent,
            redemption_fee_percent,
            ..Self::default()
        }
    }

    /// True until the pool has been seeded with reserves
    pub fn is_empty(&self) -> bool {
        self.share_reserves.is_zero() && self.bond_reserves.is_zero()
    }

    /// `z * c`, the share reserves valued in base
    pub fn total_reserves_in_base(&self) -> AmmResult<FixedPoint> {
        Ok(self.share_reserves.mul_down(self.share_price)?)
    }

    /// Apply `delta` and return the checked result
    ///
    /// Base deltas convert to shares at the pre-update share price.
    pub fn apply_delta(&self, delta: &MarketDeltas) -> AmmResult<MarketState> {
        let d_shares = delta.d_base_asset.div_down(self.share_price)?;
        let next = MarketState {
            share_reserves: self.share_reserves.checked_add(d_shares)?,
            bond_reserves: self.bond_reserves.checked_add(delta.d_bond_asset)?,
            base_buffer: self.base_buffer.checked_add(delta.d_base_buffer)?,
            bond_buffer: self.bond_buffer.checked_add(delta.d_bond_buffer)?,
            lp_total_supply: self.lp_total_supply.checked_add(delta.d_lp_total_supply)?,
            share_price: self.share_price.checked_add(delta.d_share_price)?,
            ..*self
        };
        next.check_market_non_zero()
    }

    /// Snap precision noise to zero and reject real negatives
    pub fn check_market_non_zero(mut self) -> AmmResult<MarketState> {
        for (field, value) in self.fields_mut() {
            if !value.is_negative() {
                continue;
            }
            if *value > -PRECISION_THRESHOLD {
                debug!(field, value = %*value, "Snapping precision residue to zero");
                *value = FixedPoint::ZERO;
            } else {
                return Err(AmmError::NegativeMarketValue {
                    field,
                    value: *value,
                });
            }
        }
        Ok(self)
    }

    /// Every field in declaration order
    pub fn fields(&self) -> [(&'static str, FixedPoint); 10] {
        [
            ("share_reserves", self.share_reserves),
            ("bond_reserves", self.bond_reserves),
            ("base_buffer", self.base_buffer),
            ("bond_buffer", self.bond_buffer),
            ("lp_total_supply", self.lp_total_supply),
            ("share_price", self.share_price),
            ("init_share_price", self.init_share_price),
            ("trade_fee_percent", self.trade_fee_percent),
            ("redemption_fee_percent", self.redemption_fee_percent),
            ("variable_apr", self.variable_apr),
        ]
    }

    fn fields_mut(&mut self) -> [(&'static str, &mut FixedPoint); 10] {
        [
            ("share_reserves", &mut self.share_reserves),
            ("bond_reserves", &mut self.bond_reserves),
            ("base_buffer", &mut self.base_buffer),
            ("bond_buffer", &mut self.bond_buffer),
            ("lp_total_supply", &mut self.lp_total_supply),
            ("share_price", &mut self.share_price),
            ("init_share_price", &mut self.init_share_price),
            ("trade_fee_percent", &mut self.trade_fee_percent),
            ("redemption_fee_percent", &mut self.redemption_fee_percent),
            ("variable_apr", &mut self.variable_apr),
        ]
    }
}

/// Signed changes to a [`MarketState`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDeltas {
    /// Base flowing into the pool, converted to shares on apply
    pub d_base_asset: FixedPoint,
    pub d_bond_asset: FixedPoint,
    pub d_base_buffer: FixedPoint,
    pub d_bond_buffer: FixedPoint,
    pub d_lp_total_supply: FixedPoint,
    pub d_share_price: FixedPoint,
}

impl MarketDeltas {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, value)| value.is_zero())
    }

    /// The delta that undoes this one
    pub fn invert(&self) -> MarketDeltas {
        -*self
    }

    pub fn fields(&self) -> [(&'static str, FixedPoint); 6] {
        [
            ("d_base_asset", self.d_base_asset),
            ("d_bond_asset", self.d_bond_asset),
            ("d_base_buffer", self.d_base_buffer),
            ("d_bond_buffer", self.d_bond_buffer),
            ("d_lp_total_supply", self.d_lp_total_supply),
            ("d_share_price", self.d_share_price),
        ]
    }
}

impl Neg for MarketDeltas {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            d_base_asset: -self.d_base_asset,
            d_bond_asset: -self.d_bond_asset,
            d_base_buffer: -self.d_base_buffer,
            d_bond_buffer: -self.d_bond_buffer,
            d_lp_total_supply: -self.d_lp_total_supply,
            d_share_price: -self.d_share_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn fp(d: Decimal) -> FixedPoint {
        FixedPoint::try_from(d).unwrap()
    }

    fn seeded_state() -> MarketState {
        MarketState {
            share_reserves: fp(dec!(1000)),
            bond_reserves: fp(dec!(1100)),
            lp_total_supply: fp(dec!(2100)),
            share_price: fp(dec!(2)),
            init_share_price: fp(dec!(1.5)),
            trade_fee_percent: fp(dec!(0.1)),
            ..MarketState::default()
        }
    }

    #[test]
    fn test_apply_delta_converts_base_to_shares() {
        let state = seeded_state();
        let delta = MarketDeltas {
            d_base_asset: fp(dec!(100)),
            d_bond_asset: fp(dec!(-50)),
            d_base_buffer: fp(dec!(50)),
            ..MarketDeltas::default()
        };
        let next = state.apply_delta(&delta).unwrap();
        assert_eq!(next.share_reserves, fp(dec!(1050)));
        assert_eq!(next.bond_reserves, fp(dec!(1050)));
        assert_eq!(next.base_buffer, fp(dec!(50)));
        // input untouched
        assert_eq!(state.share_reserves, fp(dec!(1000)));
    }

    #[test]
    fn test_share_price_delta_applies_after_conversion() {
        let state = seeded_state();
        let delta = MarketDeltas {
            d_base_asset: fp(dec!(20)),
            d_share_price: fp(dec!(0.5)),
            ..MarketDeltas::default()
        };
        let next = state.apply_delta(&delta).unwrap();
        assert_eq!(next.share_reserves, fp(dec!(1010)));
        assert_eq!(next.share_price, fp(dec!(2.5)));
    }

    #[test]
    fn test_snaps_precision_residue() {
        let state = seeded_state();
        let delta = MarketDeltas {
            d_bond_asset: -(state.bond_reserves + fp(dec!(0.000000001))),
            ..MarketDeltas::default()
        };
        let next = state.apply_delta(&delta).unwrap();
        assert_eq!(next.bond_reserves, FixedPoint::ZERO);
    }

    #[test]
    fn test_rejects_negative_reserves() {
        let state = seeded_state();
        let delta = MarketDeltas {
            d_bond_buffer: fp(dec!(-0.00000001)),
            ..MarketDeltas::default()
        };
        let err = state.apply_delta(&delta).unwrap_err();
        assert_eq!(
            err,
            AmmError::NegativeMarketValue {
                field: "bond_buffer",
                value: fp(dec!(-0.00000001)),
            }
        );
    }

    #[test]
    fn test_invert_round_trip() {
        let state = seeded_state();
        let delta = MarketDeltas {
            d_base_asset: fp(dec!(10)),
            d_bond_asset: fp(dec!(-7.5)),
            d_base_buffer: fp(dec!(3)),
            d_lp_total_supply: fp(dec!(12)),
            ..MarketDeltas::default()
        };
        let restored = state
            .apply_delta(&delta)
            .unwrap()
            .apply_delta(&delta.invert())
            .unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_empty_and_fields() {
        let state = MarketState::empty(fp(dec!(1.2)), fp(dec!(0.05)), fp(dec!(0.01)));
        assert!(state.is_empty());
        assert_eq!(state.init_share_price, fp(dec!(1.2)));
        assert!(!seeded_state().is_empty());
        assert_eq!(seeded_state().total_reserves_in_base().unwrap(), fp(dec!(2000)));

        let names: Vec<_> = seeded_state().fields().iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "share_reserves");
        assert!(MarketDeltas::default().is_empty());
    }
}
