//! Pricing models for the time-decaying fixed-rate curve
//!
//! All variants price against the same invariant
//!
//! ```text
//! k = (c / mu) * (mu * z)^(1 - tau) + (2y + c * z)^(1 - tau)
//! ```
//!
//! and differ in how a trade is routed onto it. The shared behaviour
//! (assertions, spot price, APR, reserve seeding, LP math and the max-trade
//! bisections) lives in provided methods of [`PricingModel`]; a variant only
//! supplies the two curve solvers.
//!
//! ## Variants
//!
//! - [`ElementPricingModel`]: legacy curve without a yield source, requires
//!   `c == mu == 1`
//! - [`YieldSpacePricingModel`]: share-price-aware curve
//! - [`HyperdrivePricingModel`]: redeems the matured fraction of a trade 1:1
//!   and prices the remainder on the YieldSpace curve at the full term

mod assertions;
mod element;
mod hyperdrive;
mod lp;
mod max_trade;
mod yieldspace;

pub use element::ElementPricingModel;
pub use hyperdrive::HyperdrivePricingModel;
pub use yieldspace::YieldSpacePricingModel;

use crate::errors::{AmmError, AmmResult};
use crate::market_state::MarketState;
use crate::time::StretchedTime;
use crate::trade::{LpQuote, Quantity, TradeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use types::FixedPoint;

const TWO: FixedPoint = FixedPoint::from_integer(2);

/// Stateless curve solver
///
/// Every method is a pure function of its arguments. Callers run
/// [`check_input_assertions`](PricingModel::check_input_assertions) before and
/// [`check_output_assertions`](PricingModel::check_output_assertions) after a
/// pricing call.
pub trait PricingModel {
    /// Human-readable name, e.g. `"YieldSpace"`
    fn model_name(&self) -> &'static str;

    /// Machine name, e.g. `"yieldspace"`
    fn model_type(&self) -> &'static str;

    /// Amount the trader must pay to receive `out`
    fn calc_in_given_out(
        &self,
        out: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult>;

    /// Amount the trader receives for paying `in_`
    fn calc_out_given_in(
        &self,
        in_: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult>;

    fn check_input_assertions(
        &self,
        quantity: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<()> {
        assertions::check_input_assertions(quantity, market_state, time_remaining)
    }

    fn check_output_assertions(&self, trade_result: &TradeResult) -> AmmResult<()> {
        assertions::check_output_assertions(trade_result)
    }

    /// `((2y + c z) / (mu z))^(-tau)`
    ///
    /// Fails with [`AmmError::UndefinedSpotPrice`] when the pool holds no
    /// shares.
    fn calc_spot_price_from_reserves(
        &self,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<FixedPoint> {
        if market_state.share_reserves.is_zero() {
            return Err(AmmError::UndefinedSpotPrice);
        }
        let total_reserves = total_reserves(market_state)?;
        let ratio = total_reserves.div_down(
            market_state
                .init_share_price
                .mul_down(market_state.share_reserves)?,
        )?;
        curve_pow(ratio, -time_remaining.stretched_time(), "spot price ratio")
    }

    /// Annual fixed rate implied by the reserves
    fn calc_apr_from_reserves(
        &self,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<FixedPoint> {
        let spot_price = self.calc_spot_price_from_reserves(market_state, time_remaining)?;
        calc_apr_from_spot_price(spot_price, time_remaining.annualized_time())
    }

    /// `y = z / 2 * (mu * (1 + r t)^(1 / tau) - c)`
    fn calc_bond_reserves(
        &self,
        target_apr: FixedPoint,
        time_remaining: &StretchedTime,
        market_state: &MarketState,
    ) -> AmmResult<FixedPoint> {
        let growth = rate_growth(target_apr, time_remaining)?;
        let bracket = market_state
            .init_share_price
            .mul_down(growth)?
            .checked_sub(market_state.share_price)?;
        Ok(market_state.share_reserves.div_down(TWO)?.mul_down(bracket)?)
    }

    /// `z = y / (mu * (1 - r t)^(1 / tau))`
    fn calc_share_reserves(
        &self,
        target_apr: FixedPoint,
        bond_reserves: FixedPoint,
        time_remaining: &StretchedTime,
        init_share_price: FixedPoint,
    ) -> AmmResult<FixedPoint> {
        let discount = FixedPoint::ONE
            .checked_sub(target_apr.mul_down(time_remaining.annualized_time())?)?;
        let inverse_tau = time_remaining.stretched_time().recip()?;
        let denominator = init_share_price.mul_down(curve_pow(discount, inverse_tau, "1 - r t")?)?;
        Ok(bond_reserves.div_down(denominator)?)
    }

    /// Share reserves valued in base at `share_price`
    fn calc_total_liquidity_from_reserves_and_price(
        &self,
        market_state: &MarketState,
        share_price: FixedPoint,
    ) -> AmmResult<FixedPoint> {
        Ok(market_state.share_reserves.mul_down(share_price)?)
    }

    /// Reserves that hold `target_liquidity` base at `target_apr`
    ///
    /// # Returns
    /// `(share_reserves, bond_reserves)`
    fn calc_liquidity(
        &self,
        market_state: &MarketState,
        target_liquidity: FixedPoint,
        target_apr: FixedPoint,
        position_duration: &StretchedTime,
    ) -> AmmResult<(FixedPoint, FixedPoint)> {
        let share_reserves = target_liquidity.div_down(market_state.share_price)?;
        let seeded = MarketState {
            share_reserves,
            ..*market_state
        };
        let bond_reserves = self.calc_bond_reserves(target_apr, position_duration, &seeded)?;
        let total_liquidity =
            self.calc_total_liquidity_from_reserves_and_price(&seeded, market_state.share_price)?;
        let scaling_factor = target_liquidity.div_down(total_liquidity)?;
        Ok((
            share_reserves.mul_down(scaling_factor)?,
            bond_reserves.mul_down(scaling_factor)?,
        ))
    }

    fn calc_lp_out_given_tokens_in(
        &self,
        d_base: FixedPoint,
        rate: FixedPoint,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<LpQuote> {
        lp::lp_out_given_tokens_in(d_base, rate, market_state, time_remaining)
    }

    fn calc_lp_in_given_tokens_out(
        &self,
        d_base: FixedPoint,
        rate: FixedPoint,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<LpQuote> {
        lp::lp_in_given_tokens_out(d_base, rate, market_state, time_remaining)
    }

    fn calc_tokens_out_given_lp_in(
        &self,
        lp_in: FixedPoint,
        rate: FixedPoint,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<LpQuote> {
        lp::tokens_out_given_lp_in(lp_in, rate, market_state, time_remaining)
    }

    /// Largest long the pool can absorb
    ///
    /// # Returns
    /// `(base paid, bonds received)`
    fn get_max_long(
        &self,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<(FixedPoint, FixedPoint)> {
        max_trade::get_max_long(self, market_state, time_remaining)
    }

    /// Largest short the pool can absorb
    ///
    /// # Returns
    /// `(max loss in base, bonds shorted)`
    fn get_max_short(
        &self,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<(FixedPoint, FixedPoint)> {
        max_trade::get_max_short(self, market_state, time_remaining)
    }
}

/// `(1 - p) / (p t)`
pub fn calc_apr_from_spot_price(
    spot_price: FixedPoint,
    annualized_time: FixedPoint,
) -> AmmResult<FixedPoint> {
    let discount = FixedPoint::ONE.checked_sub(spot_price)?;
    Ok(discount.div_down(spot_price.mul_down(annualized_time)?)?)
}

/// `1 / (1 + r t)`
pub fn calc_spot_price_from_apr(
    apr: FixedPoint,
    annualized_time: FixedPoint,
) -> AmmResult<FixedPoint> {
    let growth = FixedPoint::ONE.checked_add(apr.mul_down(annualized_time)?)?;
    Ok(growth.recip()?)
}

/// `2y + c z`
pub(crate) fn total_reserves(market_state: &MarketState) -> AmmResult<FixedPoint> {
    let shares_in_base = market_state
        .share_price
        .mul_down(market_state.share_reserves)?;
    Ok(TWO
        .mul_down(market_state.bond_reserves)?
        .checked_add(shares_in_base)?)
}

/// `(1 + r t)^(1 / tau)` with `t` in years
pub(crate) fn rate_growth(rate: FixedPoint, time_remaining: &StretchedTime) -> AmmResult<FixedPoint> {
    let growth = FixedPoint::ONE.checked_add(rate.mul_down(time_remaining.annualized_time())?)?;
    let inverse_tau = time_remaining.stretched_time().recip()?;
    curve_pow(growth, inverse_tau, "1 + r t")
}

/// `base^exponent` for a curve term
///
/// A negative term raised to a fractional power has no real value; that is a
/// trade the curve cannot support, reported as insolvency.
pub(crate) fn curve_pow(
    base: FixedPoint,
    exponent: FixedPoint,
    term: &'static str,
) -> AmmResult<FixedPoint> {
    if base.is_negative() {
        return Err(AmmError::insolvent(format!(
            "{term} = {base} is negative under exponent {exponent}"
        )));
    }
    Ok(base.pow(exponent)?)
}

/// Closed set of pricing models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PricingModelKind {
    Element(ElementPricingModel),
    YieldSpace(YieldSpacePricingModel),
    Hyperdrive(HyperdrivePricingModel),
}

impl PricingModelKind {
    pub const ALL: [PricingModelKind; 3] = [
        PricingModelKind::Element(ElementPricingModel),
        PricingModelKind::YieldSpace(YieldSpacePricingModel),
        PricingModelKind::Hyperdrive(HyperdrivePricingModel),
    ];

    fn inner(&self) -> &dyn PricingModel {
        match self {
            PricingModelKind::Element(model) => model as &dyn PricingModel,
            PricingModelKind::YieldSpace(model) => model as &dyn PricingModel,
            PricingModelKind::Hyperdrive(model) => model as &dyn PricingModel,
        }
    }
}

impl Default for PricingModelKind {
    fn default() -> Self {
        PricingModelKind::Hyperdrive(HyperdrivePricingModel)
    }
}

impl PricingModel for PricingModelKind {
    fn model_name(&self) -> &'static str {
        self.inner().model_name()
    }

    fn model_type(&self) -> &'static str {
        self.inner().model_type()
    }

    fn calc_in_given_out(
        &self,
        out: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult> {
        self.inner()
            .calc_in_given_out(out, market_state, time_remaining)
    }

    fn calc_out_given_in(
        &self,
        in_: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult> {
        self.inner()
            .calc_out_given_in(in_, market_state, time_remaining)
    }

    fn check_input_assertions(
        &self,
        quantity: Quantity,
        market_state: &MarketState,
        time_remaining: &StretchedTime,
    ) -> AmmResult<()> {
        self.inner()
            .check_input_assertions(quantity, market_state, time_remaining)
    }
}

impl fmt::Display for PricingModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

impl FromStr for PricingModelKind {
    type Err = AmmError;

    /// Accepts the model name or type in any case, with or without an
    /// underscore (`"YieldSpace"`, `"yield_space"`, `"yieldspace"`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .flat_map(char::to_lowercase)
            .collect();
        PricingModelKind::ALL
            .into_iter()
            .find(|kind| kind.model_type() == wanted)
            .ok_or_else(|| AmmError::UnknownName {
                what: "pricing model",
                name: s.to_string(),
            })
    }
}

impl TryFrom<String> for PricingModelKind {
    type Error = AmmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PricingModelKind> for String {
    fn from(kind: PricingModelKind) -> Self {
        kind.model_name().to_string()
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

    #[test]
    fn test_parse_model_names() {
        for (name, expected) in [
            ("Hyperdrive", "Hyperdrive"),
            ("yieldspace", "YieldSpace"),
            ("Yield_Space", "YieldSpace"),
            ("ELEMENT", "Element"),
        ] {
            let kind: PricingModelKind = name.parse().unwrap();
            assert_eq!(kind.model_name(), expected);
        }
        let err = "uniswap".parse::<PricingModelKind>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(PricingModelKind::default().to_string(), "Hyperdrive");
    }

    #[test]
    fn test_apr_spot_price_inverse() {
        let t = fp(dec!(0.5));
        let price = calc_spot_price_from_apr(fp(dec!(0.05)), t).unwrap();
        assert_close(price, dec!(0.975609756097560975), dec!(0.000000000000001));
        let apr = calc_apr_from_spot_price(price, t).unwrap();
        assert_close(apr, dec!(0.05), dec!(0.000000000001));
    }

    #[test]
    fn test_bond_reserves_hit_target_apr() {
        let model = YieldSpacePricingModel;
        let time = half_year();
        let mut state = MarketState {
            share_reserves: fp(dec!(100000)),
            ..MarketState::default()
        };
        state.bond_reserves = model
            .calc_bond_reserves(fp(dec!(0.05)), &time, &state)
            .unwrap();
        let apr = model.calc_apr_from_reserves(&state, &time).unwrap();
        assert_close(apr, dec!(0.05), dec!(0.0000001));
    }

    #[test]
    fn test_bond_reserves_annualize_short_terms() {
        // a 90 day term normalized by its own length still quotes a yearly rate
        let model = HyperdrivePricingModel;
        let time = StretchedTime::new(fp(dec!(90)), fp(dec!(22.186877016851916)), fp(dec!(90))).unwrap();
        let mut state = MarketState {
            share_reserves: fp(dec!(1000000)),
            ..MarketState::default()
        };
        state.bond_reserves = model
            .calc_bond_reserves(fp(dec!(0.05)), &time, &state)
            .unwrap();
        let spot_price = model.calc_spot_price_from_reserves(&state, &time).unwrap();
        // 1 / (1 + 0.05 * 90 / 365)
        assert_close(spot_price, dec!(0.987821380243572395), dec!(0.000000001));
        let apr = model.calc_apr_from_reserves(&state, &time).unwrap();
        assert_close(apr, dec!(0.05), dec!(0.0000001));
    }

    #[test]
    fn test_share_reserves_inverts_bond_reserves() {
        let model = HyperdrivePricingModel;
        let time = half_year();
        let bond_reserves = fp(dec!(250000));
        let share_reserves = model
            .calc_share_reserves(fp(dec!(0.05)), bond_reserves, &time, FixedPoint::ONE)
            .unwrap();
        // discounted by (1 - r t)^(1 / tau) < 1
        assert!(share_reserves > bond_reserves);
    }

    #[test]
    fn test_spot_price_undefined_without_shares() {
        let model = ElementPricingModel;
        let err = model
            .calc_spot_price_from_reserves(&MarketState::default(), &half_year())
            .unwrap_err();
        assert_eq!(err, AmmError::UndefinedSpotPrice);
    }

    #[test]
    fn test_calc_liquidity_targets_base_liquidity() {
        let model = HyperdrivePricingModel;
        let time = StretchedTime::new(fp(dec!(90)), fp(dec!(11.093438508425959)), fp(dec!(90))).unwrap();
        let state = MarketState {
            share_price: fp(dec!(2)),
            init_share_price: fp(dec!(2)),
            ..MarketState::default()
        };
        let (share_reserves, bond_reserves) = model
            .calc_liquidity(&state, fp(dec!(1000000)), fp(dec!(0.025)), &time)
            .unwrap();
        assert_close(share_reserves, dec!(500000), dec!(0.000001));
        let seeded = MarketState {
            share_reserves,
            bond_reserves,
            ..state
        };
        let apr = model.calc_apr_from_reserves(&seeded, &time).unwrap();
        assert_close(apr, dec!(0.025), dec!(0.0000001));
    }

    #[test]
    fn test_curve_pow_rejects_negative_terms() {
        let err = curve_pow(fp(dec!(-1)), fp(dec!(0.5)), "k - x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }
}
