//! Largest long and short a pool can absorb
//!
//! Both searches bisect over the fraction of the free bond reserves
//! (`y - bond_buffer`) a trade would take. A candidate is accepted when the
//! post-trade pool still has a non-negative fixed rate, enough shares to back
//! the base buffer, and enough bonds to back the bond buffer. Any pricing
//! failure on a candidate counts as a rejection.

use super::PricingModel;
use crate::errors::AmmResult;
use crate::market_state::{MarketDeltas, MarketState};
use crate::time::StretchedTime;
use crate::trade::Quantity;
use tracing::{debug, trace};
use types::FixedPoint;

const MAX_TRADE_ITERATIONS: u32 = 25;

/// `(base paid, bonds received)` for the largest accepted long
pub(crate) fn get_max_long<M: PricingModel + ?Sized>(
    model: &M,
    market_state: &MarketState,
    time_remaining: &StretchedTime,
) -> AmmResult<(FixedPoint, FixedPoint)> {
    let available_bonds = market_state
        .bond_reserves
        .checked_sub(market_state.bond_buffer)?;
    if !available_bonds.is_positive() {
        return Ok((FixedPoint::ZERO, FixedPoint::ZERO));
    }
    let max_long = bisect(|bond_percent| {
        try_long(model, market_state, time_remaining, available_bonds, bond_percent)
            .unwrap_or_else(|err| {
                trace!(%bond_percent, %err, "Rejecting long candidate");
                None
            })
    })?;
    debug!(base = %max_long.0, bonds = %max_long.1, model = model.model_name(), "Max long");
    Ok(max_long)
}

/// `(max loss in base, bonds shorted)` for the largest accepted short
pub(crate) fn get_max_short<M: PricingModel + ?Sized>(
    model: &M,
    market_state: &MarketState,
    time_remaining: &StretchedTime,
) -> AmmResult<(FixedPoint, FixedPoint)> {
    let available_bonds = market_state
        .bond_reserves
        .checked_sub(market_state.bond_buffer)?;
    if !available_bonds.is_positive() {
        return Ok((FixedPoint::ZERO, FixedPoint::ZERO));
    }
    let max_short = bisect(|bond_percent| {
        try_short(model, market_state, time_remaining, available_bonds, bond_percent)
            .unwrap_or_else(|err| {
                trace!(%bond_percent, %err, "Rejecting short candidate");
                None
            })
    })?;
    debug!(max_loss = %max_short.0, bonds = %max_short.1, model = model.model_name(), "Max short");
    Ok(max_short)
}

/// Step `bond_percent` by `1 / 2^(k + 1)` toward the boundary of accepted
/// candidates, returning the last accepted one. A full-size success ends early.
fn bisect<F>(mut candidate: F) -> AmmResult<(FixedPoint, FixedPoint)>
where
    F: FnMut(FixedPoint) -> Option<(FixedPoint, FixedPoint)>,
{
    let mut bond_percent = FixedPoint::ONE;
    let mut last_accepted = (FixedPoint::ZERO, FixedPoint::ZERO);
    for k in 0..MAX_TRADE_ITERATIONS {
        let step = FixedPoint::from_raw(FixedPoint::SCALE >> (k + 1));
        match candidate(bond_percent) {
            Some(accepted) => {
                last_accepted = accepted;
                if bond_percent == FixedPoint::ONE {
                    return Ok(last_accepted);
                }
                bond_percent = bond_percent.checked_add(step)?;
            }
            None => bond_percent = bond_percent.checked_sub(step)?,
        }
    }
    Ok(last_accepted)
}

fn try_long<M: PricingModel + ?Sized>(
    model: &M,
    market_state: &MarketState,
    time_remaining: &StretchedTime,
    available_bonds: FixedPoint,
    bond_percent: FixedPoint,
) -> AmmResult<Option<(FixedPoint, FixedPoint)>> {
    let target_bonds = available_bonds.mul_down(bond_percent)?;
    let base = model
        .calc_in_given_out(Quantity::pt(target_bonds), market_state, time_remaining)?
        .breakdown
        .with_fee;
    if !base.is_positive() {
        return Ok(None);
    }
    // re-quote from the base side, which is the more accurate direction
    let trade = model.calc_out_given_in(Quantity::base(base), market_state, time_remaining)?;
    let bonds = trade.breakdown.with_fee;
    let post_trade = market_state.apply_delta(&MarketDeltas {
        d_base_asset: trade.market_result.d_base,
        d_bond_asset: trade.market_result.d_bonds,
        d_base_buffer: bonds,
        ..MarketDeltas::default()
    })?;
    if market_state.bond_reserves < bonds
        || !is_solvent(model, &post_trade, time_remaining)?
    {
        return Ok(None);
    }
    Ok(Some((base, bonds)))
}

fn try_short<M: PricingModel + ?Sized>(
    model: &M,
    market_state: &MarketState,
    time_remaining: &StretchedTime,
    available_bonds: FixedPoint,
    bond_percent: FixedPoint,
) -> AmmResult<Option<(FixedPoint, FixedPoint)>> {
    let bonds = available_bonds.mul_down(bond_percent)?;
    let trade = model.calc_out_given_in(Quantity::pt(bonds), market_state, time_remaining)?;
    let max_loss = bonds.checked_sub(trade.breakdown.with_fee)?;
    if !max_loss.is_positive() {
        return Ok(None);
    }
    let post_trade = market_state.apply_delta(&MarketDeltas {
        d_base_asset: trade.market_result.d_base,
        d_bond_asset: trade.market_result.d_bonds,
        d_bond_buffer: bonds,
        ..MarketDeltas::default()
    })?;
    if !is_solvent(model, &post_trade, time_remaining)? {
        return Ok(None);
    }
    Ok(Some((max_loss, bonds)))
}

fn is_solvent<M: PricingModel + ?Sized>(
    model: &M,
    post_trade: &MarketState,
    time_remaining: &StretchedTime,
) -> AmmResult<bool> {
    let apr = model.calc_apr_from_reserves(post_trade, time_remaining)?;
    Ok(!apr.is_negative()
        && post_trade.total_reserves_in_base()? >= post_trade.base_buffer
        && post_trade.bond_reserves >= post_trade.bond_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{HyperdrivePricingModel, PricingModelKind, YieldSpacePricingModel};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn fp(d: Decimal) -> FixedPoint {
        FixedPoint::try_from(d).unwrap()
    }

    fn term() -> StretchedTime {
        StretchedTime::new(fp(dec!(365)), fp(dec!(22.186877016851916)), fp(dec!(365))).unwrap()
    }

    fn seeded() -> MarketState {
        let mut state = MarketState {
            share_reserves: fp(dec!(1000000)),
            trade_fee_percent: fp(dec!(0.1)),
            redemption_fee_percent: fp(dec!(0.005)),
            ..MarketState::default()
        };
        state.bond_reserves = HyperdrivePricingModel
            .calc_bond_reserves(fp(dec!(0.05)), &term(), &state)
            .unwrap();
        state.lp_total_supply = state.share_reserves + state.bond_reserves;
        state
    }

    #[test]
    fn test_bisect_walks_to_boundary() {
        // accept anything at or below 0.3
        let limit = fp(dec!(0.3));
        let (found, _) = bisect(|pct| (pct <= limit).then_some((pct, pct))).unwrap();
        assert!(found <= limit);
        assert!(limit - found < fp(dec!(0.0000001)));
    }

    #[test]
    fn test_bisect_full_size_returns_immediately() {
        let mut calls = 0;
        let found = bisect(|pct| {
            calls += 1;
            Some((pct, pct))
        })
        .unwrap();
        assert_eq!(found, (FixedPoint::ONE, FixedPoint::ONE));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_bisect_never_accepting_stays_in_range() {
        let mut tried = Vec::new();
        let found = bisect(|pct| {
            tried.push(pct);
            None
        })
        .unwrap();
        assert_eq!(found, (FixedPoint::ZERO, FixedPoint::ZERO));
        // the steps sum to just under one, so the fraction never goes negative
        assert!(tried.iter().all(|pct| pct.is_positive() && *pct <= FixedPoint::ONE));
    }

    #[test]
    fn test_no_free_bonds_means_no_trade() {
        let state = MarketState {
            bond_buffer: seeded().bond_reserves,
            ..seeded()
        };
        let zero = (FixedPoint::ZERO, FixedPoint::ZERO);
        assert_eq!(HyperdrivePricingModel.get_max_long(&state, &term()).unwrap(), zero);
        assert_eq!(HyperdrivePricingModel.get_max_short(&state, &term()).unwrap(), zero);
    }

    #[test]
    fn test_max_long_leaves_pool_solvent() {
        let state = seeded();
        let model = HyperdrivePricingModel;
        let (base, bonds) = model.get_max_long(&state, &term()).unwrap();
        assert!(base.is_positive());
        assert!(bonds > base);
        assert!(bonds <= state.bond_reserves);

        let trade = model
            .calc_out_given_in(Quantity::base(base), &state, &term())
            .unwrap();
        let post_trade = state
            .apply_delta(&MarketDeltas {
                d_base_asset: trade.market_result.d_base,
                d_bond_asset: trade.market_result.d_bonds,
                d_base_buffer: bonds,
                ..MarketDeltas::default()
            })
            .unwrap();
        assert!(is_solvent(&model, &post_trade, &term()).unwrap());
    }

    #[test]
    fn test_max_short_leaves_pool_solvent() {
        let state = seeded();
        let model = PricingModelKind::YieldSpace(YieldSpacePricingModel);
        let (max_loss, bonds) = model.get_max_short(&state, &term()).unwrap();
        assert!(max_loss.is_positive());
        assert!(bonds > max_loss);

        let trade = model
            .calc_out_given_in(Quantity::pt(bonds), &state, &term())
            .unwrap();
        assert_eq!(bonds - trade.breakdown.with_fee, max_loss);
        let post_trade = state
            .apply_delta(&MarketDeltas {
                d_base_asset: trade.market_result.d_base,
                d_bond_asset: trade.market_result.d_bonds,
                d_bond_buffer: bonds,
                ..MarketDeltas::default()
            })
            .unwrap();
        assert!(is_solvent(&model, &post_trade, &term()).unwrap());
    }
}
