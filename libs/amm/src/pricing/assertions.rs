//! Guards shared by every pricing model

use crate::errors::{AmmError, AmmResult};
use crate::market_state::{MarketState, MAX_RESERVES_DIFFERENCE};
use crate::time::StretchedTime;
use crate::trade::{Quantity, TradeResult};
use types::FixedPoint;

/// Reject trades the curve is not defined for
pub(crate) fn check_input_assertions(
    quantity: Quantity,
    market_state: &MarketState,
    time_remaining: &StretchedTime,
) -> AmmResult<()> {
    if quantity.amount < FixedPoint::WEI {
        return Err(AmmError::invalid(format!(
            "trade amount must be at least one wei, got {}",
            quantity.amount
        )));
    }
    if market_state.share_reserves < FixedPoint::WEI {
        return Err(AmmError::assertion(format!(
            "share reserves must be at least one wei, got {}",
            market_state.share_reserves
        )));
    }
    if market_state.bond_reserves < FixedPoint::WEI && !market_state.bond_reserves.is_zero() {
        return Err(AmmError::assertion(format!(
            "bond reserves must be zero or at least one wei, got {}",
            market_state.bond_reserves
        )));
    }
    check_share_prices(market_state)?;

    let reserves_difference = market_state
        .share_reserves
        .mul_down(market_state.share_price)?
        .checked_sub(market_state.bond_reserves)?
        .abs();
    if reserves_difference >= MAX_RESERVES_DIFFERENCE {
        return Err(AmmError::assertion(format!(
            "reserves differ by {reserves_difference}, limit is {MAX_RESERVES_DIFFERENCE}"
        )));
    }
    check_fraction("trade fee percent", market_state.trade_fee_percent)?;
    check_fraction("redemption fee percent", market_state.redemption_fee_percent)?;

    let stretched_time = time_remaining.stretched_time();
    if stretched_time.is_negative() || stretched_time >= FixedPoint::ONE {
        return Err(AmmError::assertion(format!(
            "stretched time remaining must be in [0, 1), got {stretched_time}"
        )));
    }
    Ok(())
}

/// Quotes must be non-negative
pub(crate) fn check_output_assertions(trade_result: &TradeResult) -> AmmResult<()> {
    let breakdown = &trade_result.breakdown;
    for (name, value) in [
        ("fee", breakdown.fee),
        ("without_fee", breakdown.without_fee),
        ("without_fee_or_slippage", breakdown.without_fee_or_slippage),
    ] {
        if value.is_negative() {
            return Err(AmmError::assertion(format!(
                "{name} must be non-negative, got {value}"
            )));
        }
    }
    Ok(())
}

/// `share_price >= init_share_price >= 1`
pub(crate) fn check_share_prices(market_state: &MarketState) -> AmmResult<()> {
    if market_state.share_price < market_state.init_share_price
        || market_state.init_share_price < FixedPoint::ONE
    {
        return Err(AmmError::assertion(format!(
            "expected share_price >= init_share_price >= 1, got share_price = {}, init_share_price = {}",
            market_state.share_price, market_state.init_share_price
        )));
    }
    Ok(())
}

fn check_fraction(name: &str, value: FixedPoint) -> AmmResult<()> {
    if value.is_negative() || value > FixedPoint::ONE {
        return Err(AmmError::assertion(format!(
            "{name} must be in [0, 1], got {value}"
        )));
    }
    Ok(())
}
