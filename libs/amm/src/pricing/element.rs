//! Legacy Element curve
//!
//! The pool holds base directly (`x`), so the share price and its initial
//! value are both pinned to one and the invariant reduces to
//! `k = x^(1 - tau) + (2y + x)^(1 - tau)`. Fees are a fraction of the gap
//! between the curve quote and face value.

use super::assertions::check_input_assertions;
use super::yieldspace::calc_k_const;
use super::{curve_pow, total_reserves, PricingModel};
use crate::errors::{AmmError, AmmResult};
use crate::market_state::MarketState;
use crate::time::StretchedTime;
use crate::trade::{Quantity, TokenType, TradeBreakdown, TradeDeltas, TradeResult};
use serde::{Deserialize, Serialize};
use types::FixedPoint;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementPricingModel;

impl ElementPricingModel {
    /// `(k - reserve^(1 - tau))^(1 / (1 - tau))`
    fn solve(k: FixedPoint, reserve: FixedPoint, time_elapsed: FixedPoint) -> AmmResult<FixedPoint> {
        let term = curve_pow(reserve, time_elapsed, "element reserve")?;
        curve_pow(
            k.checked_sub(term)?,
            time_elapsed.recip()?,
            "k - reserve^(1 - tau)",
        )
    }
}

impl PricingModel for ElementPricingModel {
    fn model_name(&self) -> &'static str {
        "Element"
    }

    fn model_type(&self) -> &'static str {
        "element"
    }

    fn check_input_assertions(
        &self,
        quantity: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<()> {
        check_input_assertions(quantity, market_state, time_remaining)?;
        if market_state.share_price != FixedPoint::ONE
            || market_state.init_share_price != FixedPoint::ONE
        {
            return Err(AmmError::assertion(format!(
                "element pools require share_price == init_share_price == 1, got {} and {}",
                market_state.share_price, market_state.init_share_price
            )));
        }
        Ok(())
    }

    fn calc_in_given_out(
        &self,
        out: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult> {
        let time_elapsed = FixedPoint::ONE.checked_sub(time_remaining.stretched_time())?;
        let bond_reserves = total_reserves(market_state)?;
        let base_reserves = market_state.share_reserves;
        let spot_price = self.calc_spot_price_from_reserves(market_state, time_remaining)?;
        let k = calc_k_const(market_state, time_elapsed)?;
        let fee_percent = market_state.trade_fee_percent;

        let (without_fee_or_slippage, without_fee, fee) = match out.unit {
            TokenType::Base => {
                let d_base = out.amount;
                let remaining = base_reserves.checked_sub(d_base)?;
                let without_fee = Self::solve(k, remaining, time_elapsed)?.checked_sub(bond_reserves)?;
                (
                    d_base.div_down(spot_price)?,
                    without_fee,
                    fee_percent.mul_down(without_fee.checked_sub(d_base)?)?,
                )
            }
            TokenType::Pt => {
                let d_bonds = out.amount;
                let remaining = bond_reserves.checked_sub(d_bonds)?;
                let without_fee = Self::solve(k, remaining, time_elapsed)?.checked_sub(base_reserves)?;
                (
                    spot_price.mul_down(d_bonds)?,
                    without_fee,
                    fee_percent.mul_down(d_bonds.checked_sub(without_fee)?)?,
                )
            }
        };
        let with_fee = without_fee.checked_add(fee)?;
        let (user_result, market_result) = match out.unit {
            TokenType::Base => (
                TradeDeltas::new(out.amount, -with_fee),
                TradeDeltas::new(-out.amount, with_fee),
            ),
            TokenType::Pt => (
                TradeDeltas::new(-with_fee, out.amount),
                TradeDeltas::new(with_fee, -out.amount),
            ),
        };
        Ok(TradeResult {
            user_result,
            market_result,
            breakdown: TradeBreakdown {
                without_fee_or_slippage,
                without_fee,
                fee,
                with_fee,
            },
        })
    }

    fn calc_out_given_in(
        &self,
        in_: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult> {
        let time_elapsed = FixedPoint::ONE.checked_sub(time_remaining.stretched_time())?;
        let bond_reserves = total_reserves(market_state)?;
        let base_reserves = market_state.share_reserves;
        let spot_price = self.calc_spot_price_from_reserves(market_state, time_remaining)?;
        let k = calc_k_const(market_state, time_elapsed)?;
        let fee_percent = market_state.trade_fee_percent;

        let (without_fee_or_slippage, without_fee, fee) = match in_.unit {
            TokenType::Base => {
                let d_base = in_.amount;
                let grown = base_reserves.checked_add(d_base)?;
                let without_fee = bond_reserves.checked_sub(Self::solve(k, grown, time_elapsed)?)?;
                (
                    d_base.div_down(spot_price)?,
                    without_fee,
                    fee_percent.mul_down(without_fee.checked_sub(d_base)?)?,
                )
            }
            TokenType::Pt => {
                let d_bonds = in_.amount;
                let grown = bond_reserves.checked_add(d_bonds)?;
                let without_fee = base_reserves.checked_sub(Self::solve(k, grown, time_elapsed)?)?;
                (
                    spot_price.mul_down(d_bonds)?,
                    without_fee,
                    fee_percent.mul_down(d_bonds.checked_sub(without_fee)?)?,
                )
            }
        };
        let with_fee = without_fee.checked_sub(fee)?;
        let (user_result, market_result) = match in_.unit {
            TokenType::Base => (
                TradeDeltas::new(-in_.amount, with_fee),
                TradeDeltas::new(in_.amount, -with_fee),
            ),
            TokenType::Pt => (
                TradeDeltas::new(with_fee, -in_.amount),
                TradeDeltas::new(-with_fee, in_.amount),
            ),
        };
        Ok(TradeResult {
            user_result,
            market_result,
            breakdown: TradeBreakdown {
                without_fee_or_slippage,
                without_fee,
                fee,
                with_fee,
            },
        })
    }
}
