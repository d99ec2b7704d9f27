//! YieldSpace curve with a yield-bearing share price
//!
//! Trades solve the invariant
//!
//! ```text
//! k = (c / mu) * (mu * z)^(1 - tau) + (2y + c z)^(1 - tau)
//! ```
//!
//! for the unknown leg. The fee is a fraction `phi` of the discount between
//! the spot quote and face value: `(1/p - 1) * phi * c dz` when base is the
//! known leg, `(1 - p) * phi * dy` when bonds are.

use super::{curve_pow, total_reserves, PricingModel};
use crate::errors::AmmResult;
use crate::market_state::MarketState;
use crate::time::StretchedTime;
use crate::trade::{Quantity, TokenType, TradeBreakdown, TradeDeltas, TradeResult};
use serde::{Deserialize, Serialize};
use types::FixedPoint;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YieldSpacePricingModel;

/// Values every YieldSpace trade needs, computed once
struct Curve {
    share_price: FixedPoint,
    init_share_price: FixedPoint,
    share_reserves: FixedPoint,
    /// `c / mu`
    scale: FixedPoint,
    /// `1 - tau`
    time_elapsed: FixedPoint,
    /// `1 / (1 - tau)`
    inverse_time_elapsed: FixedPoint,
    /// `2y + c z`
    total_reserves: FixedPoint,
    k: FixedPoint,
    spot_price: FixedPoint,
    fee_percent: FixedPoint,
}

impl Curve {
    fn new(
        model: &YieldSpacePricingModel,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<Self> {
        let time_elapsed = FixedPoint::ONE.checked_sub(time_remaining.stretched_time())?;
        let scale = market_state
            .share_price
            .div_down(market_state.init_share_price)?;
        let total_reserves = total_reserves(market_state)?;
        let k = calc_k_const(market_state, time_elapsed)?;
        Ok(Self {
            share_price: market_state.share_price,
            init_share_price: market_state.init_share_price,
            share_reserves: market_state.share_reserves,
            scale,
            time_elapsed,
            inverse_time_elapsed: time_elapsed.recip()?,
            total_reserves,
            k,
            spot_price: model.calc_spot_price_from_reserves(market_state, time_remaining)?,
            fee_percent: market_state.trade_fee_percent,
        })
    }

    /// `(c / mu) * (mu * shares)^(1 - tau)`
    fn share_term(&self, shares: FixedPoint) -> AmmResult<FixedPoint> {
        let scaled = curve_pow(
            self.init_share_price.mul_down(shares)?,
            self.time_elapsed,
            "mu * z",
        )?;
        Ok(self.scale.mul_down(scaled)?)
    }

    /// `(k - share_term(shares))^(1 / (1 - tau))`, the bond side for a share level
    fn solve_bonds(&self, shares: FixedPoint) -> AmmResult<FixedPoint> {
        let remainder = self.k.checked_sub(self.share_term(shares)?)?;
        curve_pow(remainder, self.inverse_time_elapsed, "k - (c / mu) * (mu * z)^(1 - tau)")
    }

    /// `(1 / mu) * ((k - bonds^(1 - tau)) / (c / mu))^(1 / (1 - tau))`, the share side for a bond level
    fn solve_shares(&self, bonds: FixedPoint) -> AmmResult<FixedPoint> {
        let bond_term = curve_pow(bonds, self.time_elapsed, "2y + c z")?;
        let remainder = self.k.checked_sub(bond_term)?.div_down(self.scale)?;
        let scaled = curve_pow(remainder, self.inverse_time_elapsed, "k - (2y + c z)^(1 - tau)")?;
        Ok(scaled.div_down(self.init_share_price)?)
    }

    /// `(1/p - 1) * phi * base`
    fn base_fee(&self, base: FixedPoint) -> AmmResult<FixedPoint> {
        let discount = self.spot_price.recip()?.checked_sub(FixedPoint::ONE)?;
        Ok(discount.mul_down(self.fee_percent)?.mul_down(base)?)
    }

    /// `(1 - p) * phi * bonds`
    fn bond_fee(&self, bonds: FixedPoint) -> AmmResult<FixedPoint> {
        let discount = FixedPoint::ONE.checked_sub(self.spot_price)?;
        Ok(discount.mul_down(self.fee_percent)?.mul_down(bonds)?)
    }
}

/// `k = (c / mu) * (mu z)^(1 - tau) + (2y + c z)^(1 - tau)`
pub fn calc_k_const(market_state: &MarketState, time_elapsed: FixedPoint) -> AmmResult<FixedPoint> {
    let scale = market_state
        .share_price
        .div_down(market_state.init_share_price)?;
    let share_term = curve_pow(
        market_state
            .init_share_price
            .mul_down(market_state.share_reserves)?,
        time_elapsed,
        "mu * z",
    )?;
    let bond_term = curve_pow(total_reserves(market_state)?, time_elapsed, "2y + c z")?;
    Ok(scale.mul_down(share_term)?.checked_add(bond_term)?)
}

impl PricingModel for YieldSpacePricingModel {
    fn model_name(&self) -> &'static str {
        "YieldSpace"
    }

    fn model_type(&self) -> &'static str {
        "yieldspace"
    }

    fn calc_in_given_out(
        &self,
        out: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult> {
        let curve = Curve::new(self, market_state, time_remaining)?;
        match out.unit {
            // trader receives base, pays bonds
            TokenType::Base => {
                let d_shares = out.amount.div_down(curve.share_price)?;
                let base_out = curve.share_price.mul_down(d_shares)?;
                let without_fee_or_slippage = base_out.div_down(curve.spot_price)?;
                let remaining_shares = curve.share_reserves.checked_sub(d_shares)?;
                let without_fee = curve
                    .solve_bonds(remaining_shares)?
                    .checked_sub(curve.total_reserves)?;
                let fee = curve.base_fee(base_out)?;
                let with_fee = without_fee.checked_add(fee)?;
                Ok(TradeResult {
                    user_result: TradeDeltas::new(out.amount, -with_fee),
                    market_result: TradeDeltas::new(-out.amount, with_fee),
                    breakdown: TradeBreakdown {
                        without_fee_or_slippage,
                        without_fee,
                        fee,
                        with_fee,
                    },
                })
            }
            // trader receives bonds, pays base
            TokenType::Pt => {
                let d_bonds = out.amount;
                let without_fee_or_slippage = curve.spot_price.mul_down(d_bonds)?;
                let remaining_bonds = curve.total_reserves.checked_sub(d_bonds)?;
                let without_fee = curve
                    .solve_shares(remaining_bonds)?
                    .checked_sub(curve.share_reserves)?
                    .mul_down(curve.share_price)?;
                let fee = curve.bond_fee(d_bonds)?;
                let with_fee = without_fee.checked_add(fee)?;
                Ok(TradeResult {
                    user_result: TradeDeltas::new(-with_fee, d_bonds),
                    market_result: TradeDeltas::new(with_fee, -d_bonds),
                    breakdown: TradeBreakdown {
                        without_fee_or_slippage,
                        without_fee,
                        fee,
                        with_fee,
                    },
                })
            }
        }
    }

    fn calc_out_given_in(
        &self,
        in_: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult> {
        let curve = Curve::new(self, market_state, time_remaining)?;
        match in_.unit {
            // trader pays base, receives bonds
            TokenType::Base => {
                let d_shares = in_.amount.div_down(curve.share_price)?;
                let base_in = curve.share_price.mul_down(d_shares)?;
                let without_fee_or_slippage = base_in.div_down(curve.spot_price)?;
                let new_shares = curve.share_reserves.checked_add(d_shares)?;
                let without_fee = curve
                    .total_reserves
                    .checked_sub(curve.solve_bonds(new_shares)?)?;
                let fee = curve.base_fee(base_in)?;
                let with_fee = without_fee.checked_sub(fee)?;
                Ok(TradeResult {
                    user_result: TradeDeltas::new(-in_.amount, with_fee),
                    market_result: TradeDeltas::new(in_.amount, -with_fee),
                    breakdown: TradeBreakdown {
                        without_fee_or_slippage,
                        without_fee,
                        fee,
                        with_fee,
                    },
                })
            }
            // trader pays bonds, receives base
            TokenType::Pt => {
                let d_bonds = in_.amount;
                let without_fee_or_slippage = curve.spot_price.mul_down(d_bonds)?;
                let new_bonds = curve.total_reserves.checked_add(d_bonds)?;
                let without_fee = curve
                    .share_reserves
                    .checked_sub(curve.solve_shares(new_bonds)?)?
                    .mul_down(curve.share_price)?;
                let fee = curve.bond_fee(d_bonds)?;
                let with_fee = without_fee.checked_sub(fee)?;
                Ok(TradeResult {
                    user_result: TradeDeltas::new(with_fee, -d_bonds),
                    market_result: TradeDeltas::new(-with_fee, d_bonds),
                    breakdown: TradeBreakdown {
                        without_fee_or_slippage,
                        without_fee,
                        fee,
                        with_fee,
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn fp(d: Decimal) -> FixedPoint {
        FixedPoint::try_from(d).unwrap()
    }

    fn assert_close(actual: FixedPoint, expected: Decimal, tolerance: Decimal) {
        let diff = (actual - fp(expected)).abs();
        assert!(
            diff <= fp(tolerance),
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    fn half_year() -> StretchedTime {
        StretchedTime::new(fp(dec!(182.5)), fp(dec!(22.186877016851916)), fp(dec!(365))).unwrap()
    }

    fn balanced_state() -> MarketState {
        MarketState {
            share_reserves: fp(dec!(100000)),
            bond_reserves: fp(dec!(100000)),
            trade_fee_percent: fp(dec!(0.1)),
            ..MarketState::default()
        }
    }

    #[test]
    fn test_buy_bonds_with_base() {
        let result = YieldSpacePricingModel
            .calc_out_given_in(Quantity::base(fp(dec!(100))), &balanced_state(), &half_year())
            .unwrap();
        let breakdown = result.breakdown;
        assert_close(breakdown.without_fee_or_slippage, dec!(102.5067), dec!(0.0001));
        assert_close(breakdown.fee, dec!(0.25067), dec!(0.00001));
        assert_close(breakdown.without_fee, dec!(102.50517), dec!(0.0001));
        assert_eq!(breakdown.with_fee, breakdown.without_fee - breakdown.fee);
        assert!(breakdown.without_fee < breakdown.without_fee_or_slippage);
        assert_eq!(result.user_result.d_base, fp(dec!(-100)));
        assert_eq!(result.market_result.d_bonds, -breakdown.with_fee);
    }

    #[test]
    fn test_sell_bonds_for_base() {
        let result = YieldSpacePricingModel
            .calc_out_given_in(Quantity::pt(fp(dec!(100))), &balanced_state(), &half_year())
            .unwrap();
        let breakdown = result.breakdown;
        assert!(breakdown.without_fee < fp(dec!(100)));
        assert!(breakdown.without_fee < breakdown.without_fee_or_slippage);
        assert_eq!(breakdown.with_fee, breakdown.without_fee - breakdown.fee);
        assert_eq!(result.user_result, TradeDeltas::new(breakdown.with_fee, fp(dec!(-100))));
    }

    #[test]
    fn test_in_given_out_costs_more_than_spot() {
        let model = YieldSpacePricingModel;
        let state = balanced_state();
        let time = half_year();

        let buy_bonds = model
            .calc_in_given_out(Quantity::pt(fp(dec!(100))), &state, &time)
            .unwrap();
        assert!(buy_bonds.breakdown.without_fee > buy_bonds.breakdown.without_fee_or_slippage);
        assert_eq!(
            buy_bonds.breakdown.with_fee,
            buy_bonds.breakdown.without_fee + buy_bonds.breakdown.fee
        );
        assert_eq!(buy_bonds.user_result.d_bonds, fp(dec!(100)));

        let buy_base = model
            .calc_in_given_out(Quantity::base(fp(dec!(100))), &state, &time)
            .unwrap();
        assert!(buy_base.breakdown.without_fee > buy_base.breakdown.without_fee_or_slippage);
        assert_eq!(buy_base.market_result.d_base, fp(dec!(-100)));
    }

    #[test]
    fn test_in_given_out_inverts_out_given_in() {
        let model = YieldSpacePricingModel;
        let state = MarketState {
            trade_fee_percent: FixedPoint::ZERO,
            ..balanced_state()
        };
        let time = half_year();
        let bonds = model
            .calc_out_given_in(Quantity::base(fp(dec!(1000))), &state, &time)
            .unwrap()
            .breakdown
            .with_fee;
        let base = model
            .calc_in_given_out(Quantity::pt(bonds), &state, &time)
            .unwrap()
            .breakdown
            .with_fee;
        assert_close(base, dec!(1000), dec!(0.000001));
    }

    #[test]
    fn test_share_price_scales_quotes() {
        let model = YieldSpacePricingModel;
        let state = MarketState {
            share_reserves: fp(dec!(50000)),
            bond_reserves: fp(dec!(100000)),
            share_price: fp(dec!(2)),
            init_share_price: fp(dec!(1.5)),
            trade_fee_percent: fp(dec!(0.05)),
            ..MarketState::default()
        };
        let result = model
            .calc_out_given_in(Quantity::base(fp(dec!(100))), &state, &half_year())
            .unwrap();
        model.check_output_assertions(&result).unwrap();
        assert!(result.breakdown.with_fee > fp(dec!(100)));
    }

    #[test]
    fn test_selling_more_bonds_than_curve_holds_is_insolvent() {
        let model = YieldSpacePricingModel;
        let state = MarketState {
            share_reserves: fp(dec!(10)),
            bond_reserves: fp(dec!(10)),
            ..MarketState::default()
        };
        let err = model
            .calc_in_given_out(Quantity::base(fp(dec!(20))), &state, &half_year())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }
}
