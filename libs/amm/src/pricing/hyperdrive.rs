//! Hyperdrive flat-plus-curve pricing
//!
//! A trade against a cohort with normalized time `t` remaining is split in
//! two. The matured fraction `amount * (1 - t)` is redeemed 1:1 (the flat
//! part) and charged the redemption fee. The rest, `amount * t`, is priced on
//! the YieldSpace curve at the full term, against reserves that already
//! reflect the flat redemption.

use super::yieldspace::YieldSpacePricingModel;
use super::PricingModel;
use crate::errors::AmmResult;
use crate::market_state::MarketState;
use crate::time::StretchedTime;
use crate::trade::{Quantity, TokenType, TradeBreakdown, TradeDeltas, TradeResult};
use serde::{Deserialize, Serialize};
use tracing::trace;
use types::FixedPoint;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HyperdrivePricingModel;

/// The flat part of a trade and the reserves the curve part is priced on
struct Split {
    flat_without_fee: FixedPoint,
    redemption_fee: FixedPoint,
    curve_amount: FixedPoint,
    curve_state: MarketState,
    full_term: StretchedTime,
}

#[derive(Clone, Copy, PartialEq)]
enum Direction {
    /// Known input, the flat redemption adds to the trader's side
    OutGivenIn,
    /// Known output, the flat redemption is paid by the trader
    InGivenOut,
}

impl HyperdrivePricingModel {
    fn split(
        quantity: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
        direction: Direction,
    ) -> AmmResult<Split> {
        let normalized_time = time_remaining.normalized_time();
        let flat_without_fee = quantity
            .amount
            .mul_down(FixedPoint::ONE.checked_sub(normalized_time)?)?;
        let d_shares = flat_without_fee.div_down(market_state.share_price)?;

        // the curve sees the reserves as if the flat part already settled
        let mut curve_state = *market_state;
        let shares_in = matches!(
            (quantity.unit, direction),
            (TokenType::Base, Direction::OutGivenIn) | (TokenType::Pt, Direction::InGivenOut)
        );
        if shares_in {
            curve_state.share_reserves = curve_state.share_reserves.checked_add(d_shares)?;
            curve_state.bond_reserves = curve_state.bond_reserves.checked_sub(flat_without_fee)?;
        } else {
            curve_state.share_reserves = curve_state.share_reserves.checked_sub(d_shares)?;
            curve_state.bond_reserves = curve_state.bond_reserves.checked_add(flat_without_fee)?;
        }

        Ok(Split {
            flat_without_fee,
            redemption_fee: flat_without_fee.mul_down(market_state.redemption_fee_percent)?,
            curve_amount: quantity.amount.mul_down(normalized_time)?,
            curve_state,
            full_term: time_remaining.full_term()?,
        })
    }

    /// Curve part of the trade; nothing to price once the cohort has matured
    fn curve(
        split: &Split,
        unit: TokenType,
        direction: Direction,
    ) -> AmmResult<TradeResult> {
        if split.curve_amount < FixedPoint::WEI {
            trace!(amount = %split.curve_amount, "Skipping curve part of matured trade");
            return Ok(TradeResult::default());
        }
        let quantity = Quantity::new(split.curve_amount, unit);
        match direction {
            Direction::OutGivenIn => {
                YieldSpacePricingModel.calc_out_given_in(quantity, &split.curve_state, &split.full_term)
            }
            Direction::InGivenOut => {
                YieldSpacePricingModel.calc_in_given_out(quantity, &split.curve_state, &split.full_term)
            }
        }
    }
}

impl PricingModel for HyperdrivePricingModel {
    fn model_name(&self) -> &'static str {
        "Hyperdrive"
    }

    fn model_type(&self) -> &'static str {
        "hyperdrive"
    }

    fn calc_in_given_out(
        &self,
        out: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult> {
        let split = Self::split(out, market_state, time_remaining, Direction::InGivenOut)?;
        let curve = Self::curve(&split, out.unit, Direction::InGivenOut)?;
        let flat_with_fee = split.flat_without_fee.checked_add(split.redemption_fee)?;

        let (user_result, market_result) = match out.unit {
            TokenType::Base => (
                TradeDeltas::new(
                    out.amount,
                    curve.user_result.d_bonds.checked_sub(flat_with_fee)?,
                ),
                TradeDeltas::new(-out.amount, curve.market_result.d_bonds),
            ),
            TokenType::Pt => (
                TradeDeltas::new(
                    curve.user_result.d_base.checked_sub(flat_with_fee)?,
                    out.amount,
                ),
                TradeDeltas::new(
                    curve.market_result.d_base.checked_add(flat_with_fee)?,
                    curve.market_result.d_bonds,
                ),
            ),
        };
        let flat = TradeBreakdown {
            without_fee_or_slippage: split.flat_without_fee,
            without_fee: split.flat_without_fee,
            fee: split.redemption_fee,
            with_fee: flat_with_fee,
        };
        Ok(TradeResult {
            user_result,
            market_result,
            breakdown: flat.checked_add(curve.breakdown)?,
        })
    }

    fn calc_out_given_in(
        &self,
        in_: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult> {
        let split = Self::split(in_, market_state, time_remaining, Direction::OutGivenIn)?;
        let curve = Self::curve(&split, in_.unit, Direction::OutGivenIn)?;
        let flat_with_fee = split.flat_without_fee.checked_sub(split.redemption_fee)?;

        let (user_result, market_result) = match in_.unit {
            TokenType::Base => (
                TradeDeltas::new(
                    -in_.amount,
                    curve.user_result.d_bonds.checked_add(flat_with_fee)?,
                ),
                TradeDeltas::new(in_.amount, curve.market_result.d_bonds),
            ),
            TokenType::Pt => (
                TradeDeltas::new(
                    curve.user_result.d_base.checked_add(flat_with_fee)?,
                    -in_.amount,
                ),
                TradeDeltas::new(
                    curve.market_result.d_base.checked_sub(flat_with_fee)?,
                    curve.market_result.d_bonds,
                ),
            ),
        };
        let flat = TradeBreakdown {
            without_fee_or_slippage: split.flat_without_fee,
            without_fee: split.flat_without_fee,
            fee: split.redemption_fee,
            with_fee: flat_with_fee,
        };
        Ok(TradeResult {
            user_result,
            market_result,
            breakdown: flat.checked_add(curve.breakdown)?,
        })
    }
}
