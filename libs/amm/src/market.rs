//! Market: trade routing over a single reserve ledger
//!
//! A [`Market`] owns one [`MarketState`] and prices every action with its
//! [`PricingModelKind`]. Each trade computes a `(MarketDeltas, WalletDeltas)`
//! pair without touching state; [`Market::trade_and_update`] then applies the
//! market side through [`Market::update_market`] and hands the wallet side
//! back to the caller, who owns the wallet.
//!
//! ## Design Principles
//!
//! - **Single Writer**: the market state changes only through
//!   `update_market`, and only after a trade fully validated
//! - **Path Dependent**: trades are applied strictly in submission order
//! - **Cohorts In Years**: `time` and every mint time are in years; a
//!   position's remaining term comes from [`years_remaining`]

use crate::errors::{AmmError, AmmResult};
use crate::market_state::{MarketDeltas, MarketState};
use crate::pricing::{PricingModel, PricingModelKind};
use crate::time::{years_remaining, StretchedTime, DAYS_PER_YEAR};
use crate::trade::{Quantity, TradeResult};
use crate::wallet::{Long, Short, Wallet, WalletDeltas};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use types::FixedPoint;

/// Iterations of the wallet-bounded short search
const MAX_SHORT_ITERATIONS: u32 = 25;

/// The six trades plus pool seeding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketActionType {
    /// Pay base, receive bonds
    OpenLong,
    /// Sell bonds back to the pool
    CloseLong,
    /// Sell bonds the pool mints, posting the max loss as margin
    OpenShort,
    /// Buy the shorted bonds back
    CloseShort,
    AddLiquidity,
    RemoveLiquidity,
    InitializeMarket,
}

impl MarketActionType {
    pub const ALL: [MarketActionType; 7] = [
        MarketActionType::OpenLong,
        MarketActionType::CloseLong,
        MarketActionType::OpenShort,
        MarketActionType::CloseShort,
        MarketActionType::AddLiquidity,
        MarketActionType::RemoveLiquidity,
        MarketActionType::InitializeMarket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketActionType::OpenLong => "open_long",
            MarketActionType::CloseLong => "close_long",
            MarketActionType::OpenShort => "open_short",
            MarketActionType::CloseShort => "close_short",
            MarketActionType::AddLiquidity => "add_liquidity",
            MarketActionType::RemoveLiquidity => "remove_liquidity",
            MarketActionType::InitializeMarket => "initialize_market",
        }
    }
}

impl fmt::Display for MarketActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketActionType {
    type Err = AmmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        MarketActionType::ALL
            .into_iter()
            .find(|action_type| action_type.as_str() == wanted)
            .ok_or_else(|| AmmError::UnknownName {
                what: "market action",
                name: s.to_string(),
            })
    }
}

/// One agent's request to the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketAction {
    pub action_type: MarketActionType,
    pub wallet_address: u64,
    /// Base for opens, liquidity and seeding; bonds for closes; LP tokens for
    /// `remove_liquidity`
    pub trade_amount: FixedPoint,
    /// Cohort being closed
    pub mint_time: Option<FixedPoint>,
    /// Rate the pool is seeded at, `initialize_market` only
    pub target_apr: Option<FixedPoint>,
}

impl MarketAction {
    pub fn new(action_type: MarketActionType, wallet_address: u64, trade_amount: FixedPoint) -> Self {
        Self {
            action_type,
            wallet_address,
            trade_amount,
            mint_time: None,
            target_apr: None,
        }
    }

    /// Seed an empty pool with `contribution` base at `target_apr`
    pub fn initialize(wallet_address: u64, contribution: FixedPoint, target_apr: FixedPoint) -> Self {
        Self {
            target_apr: Some(target_apr),
            ..Self::new(MarketActionType::InitializeMarket, wallet_address, contribution)
        }
    }

    pub fn with_mint_time(mut self, mint_time: FixedPoint) -> Self {
        self.mint_time = Some(mint_time);
        self
    }
}

/// A fixed-term pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    market_state: MarketState,
    pricing_model: PricingModelKind,
    /// Term of a freshly opened position
    position_duration: StretchedTime,
    /// Market time in years
    time: FixedPoint,
}

impl Market {
    pub fn new(
        pricing_model: PricingModelKind,
        market_state: MarketState,
        position_duration: StretchedTime,
    ) -> Self {
        Self {
            market_state,
            pricing_model,
            position_duration,
            time: FixedPoint::ZERO,
        }
    }

    pub fn market_state(&self) -> &MarketState {
        &self.market_state
    }

    pub fn pricing_model(&self) -> PricingModelKind {
        self.pricing_model
    }

    pub fn position_duration(&self) -> &StretchedTime {
        &self.position_duration
    }

    pub fn time(&self) -> FixedPoint {
        self.time
    }

    /// Fixed rate over the position term; `None` while the pool holds no
    /// shares
    pub fn fixed_apr(&self) -> AmmResult<Option<FixedPoint>> {
        if self.market_state.share_reserves.is_zero() {
            return Ok(None);
        }
        self.pricing_model
            .calc_apr_from_reserves(&self.market_state, &self.position_duration)
            .map(Some)
    }

    /// Bond price in base; `None` while the pool holds no shares
    pub fn spot_price(&self) -> AmmResult<Option<FixedPoint>> {
        if self.market_state.share_reserves.is_zero() {
            return Ok(None);
        }
        self.pricing_model
            .calc_spot_price_from_reserves(&self.market_state, &self.position_duration)
            .map(Some)
    }

    /// Curve time left for the cohort minted at `mint_time`
    pub fn time_remaining(&self, mint_time: FixedPoint) -> AmmResult<StretchedTime> {
        let years = years_remaining(self.time, mint_time, self.position_duration.annualized_time())?;
        self.position_duration
            .with_days(years.mul_down(DAYS_PER_YEAR)?)
    }

    /// Advance market time
    pub fn tick(&mut self, delta_years: FixedPoint) -> AmmResult<()> {
        if delta_years.is_negative() {
            return Err(AmmError::invalid(format!(
                "market time cannot move backwards, got a step of {delta_years} years"
            )));
        }
        self.time = self.time.checked_add(delta_years)?;
        Ok(())
    }

    /// Grow the share price by `days` of the variable rate,
    /// `c * (1 + apr / 365)^days`
    pub fn accrue_interest(&mut self, days: FixedPoint) -> AmmResult<()> {
        if days.is_negative() {
            return Err(AmmError::invalid(format!(
                "interest accrues over a non-negative number of days, got {days}"
            )));
        }
        let daily = FixedPoint::ONE.checked_add(self.market_state.variable_apr.div_down(DAYS_PER_YEAR)?)?;
        let share_price = self.market_state.share_price.mul_down(daily.pow(days)?)?;
        self.update_market(&MarketDeltas {
            d_share_price: share_price.checked_sub(self.market_state.share_price)?,
            ..MarketDeltas::default()
        })
    }

    /// Apply `market_deltas` and replace the state with the checked result
    pub fn update_market(&mut self, market_deltas: &MarketDeltas) -> AmmResult<()> {
        self.market_state = self.market_state.apply_delta(market_deltas)?;
        Ok(())
    }

    /// Price `action`, apply the market side and return the wallet side
    ///
    /// # Returns
    /// `(agent_id, wallet deltas, market deltas)`
    ///
    /// # Errors
    /// Nothing is applied when pricing fails, when the market state would
    /// break an invariant, or when `wallet` cannot settle its side of the
    /// trade.
    pub fn trade_and_update(
        &mut self,
        agent_id: u64,
        action: &MarketAction,
        wallet: &Wallet,
    ) -> AmmResult<(u64, WalletDeltas, MarketDeltas)> {
        if action.wallet_address != wallet.address {
            return Err(AmmError::WalletMismatch {
                wallet: wallet.address,
                deltas: action.wallet_address,
            });
        }
        let address = wallet.address;
        let amount = action.trade_amount;
        let (market_deltas, wallet_deltas) = match action.action_type {
            MarketActionType::OpenLong => self.open_long(address, amount)?,
            MarketActionType::CloseLong => {
                let mint_time = require_mint_time(action)?;
                self.close_long(address, amount, mint_time)?
            }
            MarketActionType::OpenShort => self.open_short(address, amount)?,
            MarketActionType::CloseShort => {
                let mint_time = require_mint_time(action)?;
                let short = wallet
                    .short(mint_time)
                    .ok_or(AmmError::UnknownPosition { address, mint_time })?;
                self.close_short(address, short.open_share_price, amount, mint_time)?
            }
            MarketActionType::AddLiquidity => self.add_liquidity(address, amount)?,
            MarketActionType::RemoveLiquidity => self.remove_liquidity(address, amount)?,
            MarketActionType::InitializeMarket => {
                let target_apr = action.target_apr.ok_or_else(|| {
                    AmmError::invalid("initialize_market requires a target APR")
                })?;
                self.initialize_market(address, amount, target_apr)?
            }
        };
        let next_state = self.market_state.apply_delta(&market_deltas)?;
        // the pool buffers also back other wallets, so they do not bound this one
        wallet.apply(&wallet_deltas)?;
        self.market_state = next_state;
        debug!(
            agent_id,
            action = %action.action_type,
            amount = %amount,
            d_base_asset = %market_deltas.d_base_asset,
            d_bond_asset = %market_deltas.d_bond_asset,
            d_base_buffer = %market_deltas.d_base_buffer,
            d_bond_buffer = %market_deltas.d_bond_buffer,
            d_lp_total_supply = %market_deltas.d_lp_total_supply,
            wallet_d_base = %wallet_deltas.balance.amount,
            "Trade accepted"
        );
        Ok((agent_id, wallet_deltas, market_deltas))
    }

    /// Spend `trade_amount` base on bonds at the current market time
    pub fn open_long(
        &self,
        wallet_address: u64,
        trade_amount: FixedPoint,
    ) -> AmmResult<(MarketDeltas, WalletDeltas)> {
        if trade_amount > self.market_state.bond_reserves {
            return Err(AmmError::invalid(format!(
                "long of {trade_amount} base exceeds bond reserves {}",
                self.market_state.bond_reserves
            )));
        }
        let quantity = Quantity::base(trade_amount);
        let trade_result = self.price_out_given_in(quantity, &self.position_duration)?;

        let market_deltas = MarketDeltas {
            d_base_asset: trade_result.market_result.d_base,
            d_bond_asset: trade_result.market_result.d_bonds,
            d_base_buffer: trade_result.user_result.d_bonds,
            ..MarketDeltas::default()
        };
        let mut wallet_deltas = WalletDeltas {
            balance: Quantity::base(trade_result.user_result.d_base),
            fees_paid: trade_result.breakdown.fee,
            ..WalletDeltas::new(wallet_address)
        };
        wallet_deltas.longs.insert(
            self.time,
            Long {
                balance: trade_result.user_result.d_bonds,
            },
        );
        Ok((market_deltas, wallet_deltas))
    }

    /// Sell `trade_amount` bonds from the cohort minted at `mint_time`
    pub fn close_long(
        &self,
        wallet_address: u64,
        trade_amount: FixedPoint,
        mint_time: FixedPoint,
    ) -> AmmResult<(MarketDeltas, WalletDeltas)> {
        let time_remaining = self.time_remaining(mint_time)?;
        let trade_result = self.price_out_given_in(Quantity::pt(trade_amount), &time_remaining)?;

        let market_deltas = MarketDeltas {
            d_base_asset: trade_result.market_result.d_base,
            d_bond_asset: trade_result.market_result.d_bonds,
            d_base_buffer: -trade_amount,
            ..MarketDeltas::default()
        };
        let mut wallet_deltas = WalletDeltas {
            balance: Quantity::base(trade_result.user_result.d_base),
            fees_paid: trade_result.breakdown.fee,
            ..WalletDeltas::new(wallet_address)
        };
        wallet_deltas.longs.insert(
            mint_time,
            Long {
                balance: trade_result.user_result.d_bonds,
            },
        );
        Ok((market_deltas, wallet_deltas))
    }

    /// Short `trade_amount` bonds
    ///
    /// The trader posts the worst-case loss (bond price rising to one) as
    /// margin: `trade_amount - proceeds`. Proceeds plus margin equal the face
    /// value of the bonds shorted.
    pub fn open_short(
        &self,
        wallet_address: u64,
        trade_amount: FixedPoint,
    ) -> AmmResult<(MarketDeltas, WalletDeltas)> {
        let trade_result = self.price_out_given_in(Quantity::pt(trade_amount), &self.position_duration)?;

        let market_deltas = MarketDeltas {
            d_base_asset: trade_result.market_result.d_base,
            d_bond_asset: trade_result.market_result.d_bonds,
            d_bond_buffer: trade_amount,
            ..MarketDeltas::default()
        };
        let max_loss = trade_amount.checked_sub(trade_result.user_result.d_base)?;
        let mut wallet_deltas = WalletDeltas {
            balance: Quantity::base(-max_loss),
            fees_paid: trade_result.breakdown.fee,
            ..WalletDeltas::new(wallet_address)
        };
        wallet_deltas.shorts.insert(
            self.time,
            Short {
                balance: trade_amount,
                open_share_price: self.market_state.share_price,
            },
        );
        Ok((market_deltas, wallet_deltas))
    }

    /// Buy back `trade_amount` shorted bonds from the cohort minted at
    /// `mint_time`
    ///
    /// The amount is clamped to the bond reserves. The trader recovers the
    /// margin grown by the share price since open, less the buy-back cost.
    pub fn close_short(
        &self,
        wallet_address: u64,
        open_share_price: FixedPoint,
        trade_amount: FixedPoint,
        mint_time: FixedPoint,
    ) -> AmmResult<(MarketDeltas, WalletDeltas)> {
        let bond_reserves = self.market_state.bond_reserves;
        let trade_amount = if trade_amount > bond_reserves {
            warn!(
                trade_amount = %trade_amount,
                bond_reserves = %bond_reserves,
                "Close short exceeds bond reserves, clamping"
            );
            bond_reserves
        } else {
            trade_amount
        };
        let time_remaining = self.time_remaining(mint_time)?;
        let trade_result = self.price_in_given_out(Quantity::pt(trade_amount), &time_remaining)?;

        let market_deltas = MarketDeltas {
            d_base_asset: trade_result.market_result.d_base,
            d_bond_asset: trade_result.market_result.d_bonds,
            d_bond_buffer: -trade_amount,
            ..MarketDeltas::default()
        };
        let margin = self
            .market_state
            .share_price
            .div_down(open_share_price)?
            .mul_down(trade_amount)?;
        let mut wallet_deltas = WalletDeltas {
            balance: Quantity::base(margin.checked_add(trade_result.user_result.d_base)?),
            fees_paid: trade_result.breakdown.fee,
            ..WalletDeltas::new(wallet_address)
        };
        wallet_deltas.shorts.insert(
            mint_time,
            Short {
                balance: -trade_amount,
                open_share_price,
            },
        );
        Ok((market_deltas, wallet_deltas))
    }

    /// Seed an empty pool with `contribution` base at `target_apr`
    ///
    /// The contributor receives `c z + y` LP tokens.
    pub fn initialize_market(
        &self,
        wallet_address: u64,
        contribution: FixedPoint,
        target_apr: FixedPoint,
    ) -> AmmResult<(MarketDeltas, WalletDeltas)> {
        if !self.market_state.is_empty() {
            return Err(AmmError::AlreadyInitialized {
                share_reserves: self.market_state.share_reserves,
                bond_reserves: self.market_state.bond_reserves,
            });
        }
        if !contribution.is_positive() {
            return Err(AmmError::invalid(format!(
                "market contribution must be positive, got {contribution}"
            )));
        }
        let seeded = MarketState {
            share_reserves: contribution.div_down(self.market_state.share_price)?,
            ..self.market_state
        };
        let bond_reserves =
            self.pricing_model
                .calc_bond_reserves(target_apr, &self.position_duration, &seeded)?;
        let lp_tokens = seeded.total_reserves_in_base()?.checked_add(bond_reserves)?;
        info!(
            contribution = %contribution,
            target_apr = %target_apr,
            share_reserves = %seeded.share_reserves,
            bond_reserves = %bond_reserves,
            model = self.pricing_model.model_name(),
            "Initializing market"
        );

        let market_deltas = MarketDeltas {
            d_base_asset: contribution,
            d_bond_asset: bond_reserves,
            d_lp_total_supply: lp_tokens,
            ..MarketDeltas::default()
        };
        let wallet_deltas = WalletDeltas {
            balance: Quantity::base(-contribution),
            lp_tokens,
            ..WalletDeltas::new(wallet_address)
        };
        Ok((market_deltas, wallet_deltas))
    }

    /// Deposit `trade_amount` base for LP tokens at the current fixed rate
    pub fn add_liquidity(
        &self,
        wallet_address: u64,
        trade_amount: FixedPoint,
    ) -> AmmResult<(MarketDeltas, WalletDeltas)> {
        let rate = self.liquidity_rate(trade_amount)?;
        let quote = self.pricing_model.calc_lp_out_given_tokens_in(
            trade_amount,
            rate,
            &self.market_state,
            &self.position_duration,
        )?;
        let market_deltas = MarketDeltas {
            d_base_asset: quote.d_base,
            d_bond_asset: quote.d_bonds,
            d_lp_total_supply: quote.lp_tokens,
            ..MarketDeltas::default()
        };
        let wallet_deltas = WalletDeltas {
            balance: Quantity::base(-quote.d_base),
            lp_tokens: quote.lp_tokens,
            ..WalletDeltas::new(wallet_address)
        };
        Ok((market_deltas, wallet_deltas))
    }

    /// Burn `trade_amount` LP tokens for base at the current fixed rate
    pub fn remove_liquidity(
        &self,
        wallet_address: u64,
        trade_amount: FixedPoint,
    ) -> AmmResult<(MarketDeltas, WalletDeltas)> {
        let rate = self.liquidity_rate(trade_amount)?;
        let quote = self.pricing_model.calc_tokens_out_given_lp_in(
            trade_amount,
            rate,
            &self.market_state,
            &self.position_duration,
        )?;
        // quote.d_bonds is already the signed change to the bond reserves
        let market_deltas = MarketDeltas {
            d_base_asset: -quote.d_base,
            d_bond_asset: quote.d_bonds,
            d_lp_total_supply: -quote.lp_tokens,
            ..MarketDeltas::default()
        };
        let wallet_deltas = WalletDeltas {
            balance: Quantity::base(quote.d_base),
            lp_tokens: -quote.lp_tokens,
            ..WalletDeltas::new(wallet_address)
        };
        Ok((market_deltas, wallet_deltas))
    }

    /// Largest long `wallet` can open: its base, capped by the pool's max
    pub fn max_long_for(&self, wallet: &Wallet) -> AmmResult<FixedPoint> {
        let (max_long, _) = self
            .pricing_model
            .get_max_long(&self.market_state, &self.position_duration)?;
        Ok(wallet.balance.amount.min(max_long))
    }

    /// Largest short, in bonds, whose max loss `wallet` can cover
    ///
    /// Bisects over a fraction of the pool's max short, keeping the last
    /// fraction that fit the budget. A final pass tries that fraction plus
    /// `1 / (2^25 + 1)` and keeps it when it still fits.
    pub fn max_short_for(&self, wallet: &Wallet) -> AmmResult<FixedPoint> {
        let budget = wallet.balance.amount;
        let (pool_max_loss, pool_max_short) = self
            .pricing_model
            .get_max_short(&self.market_state, &self.position_duration)?;
        if budget >= pool_max_loss {
            return Ok(pool_max_short);
        }

        let mut bond_percent = FixedPoint::ONE;
        let mut last_affordable = None;
        for k in 0..MAX_SHORT_ITERATIONS {
            let step = FixedPoint::from_raw(FixedPoint::SCALE >> (k + 1));
            let bonds = pool_max_short.mul_down(bond_percent)?;
            if self.short_fits_budget(bonds, budget) {
                if bond_percent == FixedPoint::ONE {
                    return Ok(bonds);
                }
                last_affordable = Some((bond_percent, bonds));
                bond_percent = bond_percent.checked_add(step)?;
            } else {
                bond_percent = bond_percent.checked_sub(step)?;
            }
        }
        let Some((affordable_percent, affordable_bonds)) = last_affordable else {
            return Ok(FixedPoint::ZERO);
        };

        let final_step = FixedPoint::ONE.div_down(FixedPoint::from_integer((1 << MAX_SHORT_ITERATIONS) + 1))?;
        let nudged_percent = affordable_percent.checked_add(final_step)?;
        if nudged_percent < FixedPoint::ONE {
            let nudged = pool_max_short.mul_down(nudged_percent)?;
            if self.short_fits_budget(nudged, budget) {
                debug!(bonds = %nudged, budget = %budget, "Max short refined by one final step");
                return Ok(nudged);
            }
        }
        Ok(affordable_bonds)
    }

    /// Actions that close every position and LP token `wallet` holds
    pub fn liquidation_actions(&self, wallet: &Wallet) -> Vec<MarketAction> {
        let longs = wallet.longs.iter().map(|(&mint_time, long)| {
            MarketAction::new(MarketActionType::CloseLong, wallet.address, long.balance)
                .with_mint_time(mint_time)
        });
        let shorts = wallet.shorts.iter().map(|(&mint_time, short)| {
            MarketAction::new(MarketActionType::CloseShort, wallet.address, short.balance)
                .with_mint_time(mint_time)
        });
        let lp = wallet.lp_tokens.is_positive().then(|| {
            MarketAction::new(MarketActionType::RemoveLiquidity, wallet.address, wallet.lp_tokens)
        });
        longs.chain(shorts).chain(lp).collect()
    }

    /// Quotes that fail count as unaffordable
    fn short_fits_budget(&self, bonds: FixedPoint, budget: FixedPoint) -> bool {
        matches!(self.short_max_loss(bonds), Ok(max_loss) if max_loss <= budget)
    }

    /// `bonds - proceeds` for shorting `bonds` now
    fn short_max_loss(&self, bonds: FixedPoint) -> AmmResult<FixedPoint> {
        let trade_result = self.pricing_model.calc_out_given_in(
            Quantity::pt(bonds),
            &self.market_state,
            &self.position_duration,
        )?;
        Ok(bonds.checked_sub(trade_result.user_result.d_base)?)
    }

    /// Rate the LP formulas hold fixed; checks the input once the pool is live
    fn liquidity_rate(&self, trade_amount: FixedPoint) -> AmmResult<FixedPoint> {
        if self.market_state.is_empty() {
            return Ok(FixedPoint::ZERO);
        }
        self.pricing_model.check_input_assertions(
            Quantity::pt(trade_amount),
            &self.market_state,
            &self.position_duration,
        )?;
        Ok(self.fixed_apr()?.unwrap_or(FixedPoint::ZERO))
    }

    fn price_out_given_in(
        &self,
        quantity: Quantity,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult> {
        self.pricing_model
            .check_input_assertions(quantity, &self.market_state, time_remaining)?;
        let trade_result =
            self.pricing_model
                .calc_out_given_in(quantity, &self.market_state, time_remaining)?;
        self.pricing_model.check_output_assertions(&trade_result)?;
        Ok(trade_result)
    }

    fn price_in_given_out(
        &self,
        quantity: Quantity,
        time_remaining: &StretchedTime,
    ) -> AmmResult<TradeResult> {
        self.pricing_model
            .check_input_assertions(quantity, &self.market_state, time_remaining)?;
        let trade_result =
            self.pricing_model
                .calc_in_given_out(quantity, &self.market_state, time_remaining)?;
        self.pricing_model.check_output_assertions(&trade_result)?;
        Ok(trade_result)
    }
}

fn require_mint_time(action: &MarketAction) -> AmmResult<FixedPoint> {
    action.mint_time.ok_or(AmmError::MissingMintTime {
        action: action.action_type.as_str(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::pricing::YieldSpacePricingModel;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn fp(d: Decimal) -> FixedPoint {
        FixedPoint::try_from(d).unwrap()
    }

    fn duration() -> StretchedTime {
        StretchedTime::new(fp(dec!(182.5)), fp(dec!(89.6)), fp(dec!(182.5))).unwrap()
    }

    fn market() -> Market {
        let state = MarketState {
            share_reserves: fp(dec!(100000)),
            bond_reserves: fp(dec!(100000)),
            lp_total_supply: fp(dec!(300000)),
            trade_fee_percent: fp(dec!(0.1)),
            redemption_fee_percent: fp(dec!(0.005)),
            variable_apr: fp(dec!(0.05)),
            ..MarketState::default()
        };
        Market::new(PricingModelKind::default(), state, duration())
    }

    #[test]
    fn test_action_type_names() {
        for action_type in MarketActionType::ALL {
            assert_eq!(action_type.as_str().parse::<MarketActionType>().unwrap(), action_type);
        }
        assert_eq!(
            "Open_Long".parse::<MarketActionType>().unwrap(),
            MarketActionType::OpenLong
        );
        let err = "borrow".parse::<MarketActionType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_close_requires_mint_time() {
        let mut market = market();
        let wallet = Wallet::new(1, fp(dec!(1000)));
        let action = MarketAction::new(MarketActionType::CloseLong, 1, fp(dec!(10)));
        let err = market.trade_and_update(0, &action, &wallet).unwrap_err();
        assert_eq!(err, AmmError::MissingMintTime { action: "close_long" });
    }

    #[test]
    fn test_close_short_needs_held_position() {
        let mut market = market();
        let wallet = Wallet::new(1, fp(dec!(1000)));
        let action = MarketAction::new(MarketActionType::CloseShort, 1, fp(dec!(10)))
            .with_mint_time(FixedPoint::ZERO);
        let before = *market.market_state();
        let err = market.trade_and_update(0, &action, &wallet).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(*market.market_state(), before);
    }

    #[test]
    fn test_rejects_action_for_other_wallet() {
        let mut market = market();
        let wallet = Wallet::new(1, fp(dec!(1000)));
        let action = MarketAction::new(MarketActionType::OpenLong, 2, fp(dec!(10)));
        assert_eq!(
            market.trade_and_update(0, &action, &wallet).unwrap_err().kind(),
            ErrorKind::State
        );
    }

    #[test]
    fn test_open_long_larger_than_bond_reserves_is_rejected() {
        let market = market();
        let err = market.open_long(1, fp(dec!(100001))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_initialize_only_once() {
        let market = market();
        let err = market
            .initialize_market(1, fp(dec!(1000)), fp(dec!(0.05)))
            .unwrap_err();
        assert!(matches!(err, AmmError::AlreadyInitialized { .. }));
    }

    #[test]
    fn test_open_short_posts_max_loss() {
        let market = market();
        let (market_deltas, wallet_deltas) = market.open_short(1, fp(dec!(100))).unwrap();
        assert_eq!(market_deltas.d_bond_buffer, fp(dec!(100)));
        assert_eq!(market_deltas.d_bond_asset, fp(dec!(100)));
        let short = wallet_deltas.shorts[&FixedPoint::ZERO];
        assert_eq!(short.balance, fp(dec!(100)));
        assert_eq!(short.open_share_price, FixedPoint::ONE);
        // proceeds plus margin equal face value
        let proceeds = -market_deltas.d_base_asset;
        assert_eq!(proceeds - wallet_deltas.balance.amount, fp(dec!(100)));
        assert!(wallet_deltas.balance.amount.is_negative());
    }

    #[test]
    fn test_close_short_clamps_to_bond_reserves() {
        let mut market = market();
        let wallet = Wallet::new(1, fp(dec!(10)));
        market.tick(fp(dec!(0.1))).unwrap();
        let (market_deltas, wallet_deltas) = market
            .close_short(wallet.address, FixedPoint::ONE, fp(dec!(200000)), fp(dec!(0.1)))
            .unwrap();
        assert_eq!(market_deltas.d_bond_buffer, fp(dec!(-100000)));
        assert_eq!(wallet_deltas.shorts[&fp(dec!(0.1))].balance, fp(dec!(-100000)));
    }

    #[test]
    fn test_time_remaining_for_cohorts() {
        let mut market = market();
        market.tick(fp(dec!(0.25))).unwrap();
        let fresh = market.time_remaining(fp(dec!(0.25))).unwrap();
        assert_eq!(fresh.days(), fp(dec!(182.5)));
        let older = market.time_remaining(FixedPoint::ZERO).unwrap();
        assert_eq!(older.days(), fp(dec!(91.25)));
        let err = market.time_remaining(fp(dec!(0.5))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        market.tick(fp(dec!(1))).unwrap();
        assert!(market.time_remaining(FixedPoint::ZERO).unwrap().days().is_zero());
        assert!(market.tick(fp(dec!(-1))).is_err());
    }

    #[test]
    fn test_accrue_interest_grows_share_price() {
        let mut market = market();
        market.accrue_interest(fp(dec!(365))).unwrap();
        let share_price = market.market_state().share_price;
        // (1 + 0.05 / 365)^365
        let expected = fp(dec!(1.051267496467462));
        assert!((share_price - expected).abs() < fp(dec!(0.000000001)));
        assert_eq!(market.market_state().share_reserves, fp(dec!(100000)));
    }

    #[test]
    fn test_empty_market_reports_no_price() {
        let market = Market::new(
            PricingModelKind::YieldSpace(YieldSpacePricingModel),
            MarketState::default(),
            duration(),
        );
        assert_eq!(market.spot_price().unwrap(), None);
        assert_eq!(market.fixed_apr().unwrap(), None);
    }

    #[test]
    fn test_liquidation_actions_cover_every_position() {
        let market = market();
        let mut wallet = Wallet::new(4, fp(dec!(100)));
        wallet.longs.insert(fp(dec!(0.1)), Long { balance: fp(dec!(5)) });
        wallet.shorts.insert(
            fp(dec!(0.2)),
            Short {
                balance: fp(dec!(7)),
                open_share_price: FixedPoint::ONE,
            },
        );
        wallet.lp_tokens = fp(dec!(3));
        let actions = market.liquidation_actions(&wallet);
        let kinds: Vec<_> = actions.iter().map(|action| action.action_type).collect();
        assert_eq!(
            kinds,
            vec![
                MarketActionType::CloseLong,
                MarketActionType::CloseShort,
                MarketActionType::RemoveLiquidity
            ]
        );
        assert_eq!(actions[1].mint_time, Some(fp(dec!(0.2))));
        assert_eq!(actions[2].trade_amount, fp(dec!(3)));
    }

    #[test]
    fn test_max_long_for_is_capped_by_wallet() {
        let market = market();
        let poor = Wallet::new(1, fp(dec!(10)));
        assert_eq!(market.max_long_for(&poor).unwrap(), fp(dec!(10)));
        let rich = Wallet::new(2, fp(dec!(100000000)));
        let max_long = market.max_long_for(&rich).unwrap();
        assert!(max_long < rich.balance.amount);
        assert!(max_long.is_positive());
    }

    #[test]
    fn test_max_short_for_is_affordable() {
        let market = market();
        let wallet = Wallet::new(1, fp(dec!(50)));
        let bonds = market.max_short_for(&wallet).unwrap();
        assert!(bonds.is_positive());
        let max_loss = market.short_max_loss(bonds).unwrap();
        assert!(max_loss <= wallet.balance.amount);
        // within one bisection step of the wallet's limit
        assert!(wallet.balance.amount - max_loss < fp(dec!(0.001)));

        // the search ends within 2^-24 of the limit, so 2^-22 more overshoots
        let (_, pool_max_short) = market
            .pricing_model
            .get_max_short(&market.market_state, &market.position_duration)
            .unwrap();
        let over = bonds + pool_max_short.mul_down(FixedPoint::from_raw(FixedPoint::SCALE >> 22)).unwrap();
        assert!(!market.short_fits_budget(over, wallet.balance.amount));
    }

    #[test]
    fn test_max_short_for_unaffordable_pool_is_zero() {
        let market = market();
        let broke = Wallet::new(1, FixedPoint::ZERO);
        assert_eq!(market.max_short_for(&broke).unwrap(), FixedPoint::ZERO);
    }
}
