//! Liquidity provisioning
//!
//! Adding or removing liquidity moves the share reserves, and the bond
//! reserves are re-derived from `rate` so the pool keeps quoting the same
//! fixed rate afterwards:
//!
//! ```text
//! y' = (z +/- dz) / 2 * (mu * (1 + r t)^(1 / tau) - c)
//! ```
//!
//! The returned `d_bonds` is the signed change `y' - y`.

use super::assertions::check_share_prices;
use super::{rate_growth, TWO};
use crate::errors::{AmmError, AmmResult};
use crate::market_state::{MarketState, PRECISION_THRESHOLD};
use crate::time::StretchedTime;
use crate::trade::LpQuote;
use tracing::debug;
use types::FixedPoint;

/// LP tokens minted for depositing `d_base`
///
/// The first deposit into an empty pool mints one token per share.
pub(crate) fn lp_out_given_tokens_in(
    d_base: FixedPoint,
    rate: FixedPoint,
    market_state: &MarketState,
    time_remaining: &StretchedTime,
) -> AmmResult<LpQuote> {
    check_amount("d_base", d_base)?;
    check_lp_inputs(rate, market_state, time_remaining, FixedPoint::ZERO)?;

    let d_shares = d_base.div_down(market_state.share_price)?;
    let lp_tokens = if market_state.share_reserves.is_positive() {
        let free_shares = market_state
            .share_reserves
            .checked_sub(market_state.base_buffer)?;
        d_shares
            .mul_down(market_state.lp_total_supply)?
            .div_down(free_shares)?
    } else {
        d_shares
    };
    let d_bonds = bonds_delta(
        market_state.share_reserves.checked_add(d_shares)?,
        rate,
        market_state,
        time_remaining,
    )?;
    debug!(
        d_base = %d_base,
        d_shares = %d_shares,
        lp_tokens = %lp_tokens,
        d_bonds = %d_bonds,
        "LP out given tokens in"
    );
    Ok(LpQuote {
        lp_tokens,
        d_base,
        d_bonds,
    })
}

/// LP tokens burned to withdraw exactly `d_base`
pub(crate) fn lp_in_given_tokens_out(
    d_base: FixedPoint,
    rate: FixedPoint,
    market_state: &MarketState,
    time_remaining: &StretchedTime,
) -> AmmResult<LpQuote> {
    check_amount("d_base", d_base)?;
    check_lp_inputs(rate, market_state, time_remaining, FixedPoint::ZERO)?;

    let d_shares = d_base.div_down(market_state.share_price)?;
    let free_shares = market_state
        .share_reserves
        .checked_sub(market_state.base_buffer.div_down(market_state.share_price)?)?;
    let lp_tokens = d_shares
        .mul_down(market_state.lp_total_supply)?
        .div_down(free_shares)?;
    let d_bonds = bonds_delta(
        market_state.share_reserves.checked_sub(d_shares)?,
        rate,
        market_state,
        time_remaining,
    )?;
    Ok(LpQuote {
        lp_tokens,
        d_base,
        d_bonds,
    })
}

/// Base and bond change for burning `lp_in` tokens
///
/// The withdrawal is the LP's pro-rata claim on the shares not reserved for
/// open longs.
pub(crate) fn tokens_out_given_lp_in(
    lp_in: FixedPoint,
    rate: FixedPoint,
    market_state: &MarketState,
    time_remaining: &StretchedTime,
) -> AmmResult<LpQuote> {
    check_amount("lp_in", lp_in)?;
    // buffers may carry rounding residue just below zero
    check_lp_inputs(rate, market_state, time_remaining, -PRECISION_THRESHOLD)?;

    let d_base = market_state
        .share_price
        .mul_down(
            market_state
                .share_reserves
                .checked_sub(market_state.base_buffer)?,
        )?
        .mul_down(lp_in)?
        .div_down(market_state.lp_total_supply)?;
    let d_shares = d_base.div_down(market_state.share_price)?;
    let d_bonds = bonds_delta(
        market_state.share_reserves.checked_sub(d_shares)?,
        rate,
        market_state,
        time_remaining,
    )?;
    debug!(
        lp_in = %lp_in,
        d_base = %d_base,
        d_bonds = %d_bonds,
        "Tokens out given LP in"
    );
    Ok(LpQuote {
        lp_tokens: lp_in,
        d_base,
        d_bonds,
    })
}

/// `z' / 2 * (mu * (1 + r t)^(1 / tau) - c) - y`
fn bonds_delta(
    next_share_reserves: FixedPoint,
    rate: FixedPoint,
    market_state: &MarketState,
    time_remaining: &StretchedTime,
) -> AmmResult<FixedPoint> {
    let bracket = market_state
        .init_share_price
        .mul_down(rate_growth(rate, time_remaining)?)?
        .checked_sub(market_state.share_price)?;
    Ok(next_share_reserves
        .div_down(TWO)?
        .mul_down(bracket)?
        .checked_sub(market_state.bond_reserves)?)
}

fn check_amount(name: &str, amount: FixedPoint) -> AmmResult<()> {
    if !amount.is_positive() {
        return Err(AmmError::invalid(format!(
            "expected {name} > 0, got {amount}"
        )));
    }
    Ok(())
}

fn check_lp_inputs(
    rate: FixedPoint,
    market_state: &MarketState,
    time_remaining: &StretchedTime,
    base_buffer_floor: FixedPoint,
) -> AmmResult<()> {
    for (name, value) in [
        ("share_reserves", market_state.share_reserves),
        ("bond_reserves", market_state.bond_reserves),
        ("lp_total_supply", market_state.lp_total_supply),
        ("rate", rate),
        ("stretched time remaining", time_remaining.stretched_time()),
    ] {
        if value.is_negative() {
            return Err(AmmError::assertion(format!(
                "expected {name} >= 0, got {value}"
            )));
        }
    }
    if market_state.base_buffer < base_buffer_floor {
        return Err(AmmError::assertion(format!(
            "expected base_buffer >= {base_buffer_floor}, got {}",
            market_state.base_buffer
        )));
    }
    let normalized_time = time_remaining.normalized_time();
    if normalized_time.is_negative() || normalized_time > FixedPoint::ONE {
        return Err(AmmError::assertion(format!(
            "expected normalized time remaining in [0, 1], got {normalized_time}"
        )));
    }
    check_share_prices(market_state)
}
