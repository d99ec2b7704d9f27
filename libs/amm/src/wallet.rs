//! Per-agent ledger of base, LP tokens and open positions
//!
//! ## Design Principles
//!
//! - **Cohorts By Mint Time**: longs and shorts are keyed by the market time
//!   (in years) the cohort was opened, in a `BTreeMap` so iteration order is
//!   deterministic
//! - **No Empty Entries**: a position whose balance reaches zero is removed
//! - **All Or Nothing**: [`Wallet::update`] validates every field against a
//!   copy and only then commits

use crate::errors::{AmmError, AmmResult};
use crate::trade::{Quantity, TokenType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use types::FixedPoint;

/// Bonds bought in one cohort
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Long {
    pub balance: FixedPoint,
}

/// Bonds shorted in one cohort and the share price they were opened at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Short {
    pub balance: FixedPoint,
    pub open_share_price: FixedPoint,
}

impl Default for Short {
    fn default() -> Self {
        Self {
            balance: FixedPoint::ZERO,
            open_share_price: FixedPoint::ONE,
        }
    }
}

/// What one agent holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: u64,
    /// Base on hand
    pub balance: Quantity,
    pub lp_tokens: FixedPoint,
    pub fees_paid: FixedPoint,
    pub longs: BTreeMap<FixedPoint, Long>,
    pub shorts: BTreeMap<FixedPoint, Short>,
    pub withdraw_shares: FixedPoint,
}

/// Signed change to a [`Wallet`], produced by a market trade
///
/// Position entries are added to the balance held at the same mint time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDeltas {
    pub address: u64,
    pub balance: Quantity,
    pub lp_tokens: FixedPoint,
    pub fees_paid: FixedPoint,
    pub longs: BTreeMap<FixedPoint, Long>,
    pub shorts: BTreeMap<FixedPoint, Short>,
    pub withdraw_shares: FixedPoint,
}

impl WalletDeltas {
    /// No-op deltas for `address`
    pub fn new(address: u64) -> Self {
        Self {
            address,
            balance: Quantity::base(FixedPoint::ZERO),
            lp_tokens: FixedPoint::ZERO,
            fees_paid: FixedPoint::ZERO,
            longs: BTreeMap::new(),
            shorts: BTreeMap::new(),
            withdraw_shares: FixedPoint::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.balance.amount.is_zero()
            && self.lp_tokens.is_zero()
            && self.fees_paid.is_zero()
            && self.withdraw_shares.is_zero()
            && self.longs.is_empty()
            && self.shorts.is_empty()
    }

    pub fn fields(&self) -> [(&'static str, FixedPoint); 4] {
        [
            ("balance", self.balance.amount),
            ("lp_tokens", self.lp_tokens),
            ("fees_paid", self.fees_paid),
            ("withdraw_shares", self.withdraw_shares),
        ]
    }
}

impl Wallet {
    /// Fresh wallet holding `budget` base
    pub fn new(address: u64, budget: FixedPoint) -> Self {
        Self {
            address,
            balance: Quantity::base(budget),
            lp_tokens: FixedPoint::ZERO,
            fees_paid: FixedPoint::ZERO,
            longs: BTreeMap::new(),
            shorts: BTreeMap::new(),
            withdraw_shares: FixedPoint::ZERO,
        }
    }

    /// Scalar fields in a fixed order
    pub fn fields(&self) -> [(&'static str, FixedPoint); 4] {
        [
            ("balance", self.balance.amount),
            ("lp_tokens", self.lp_tokens),
            ("fees_paid", self.fees_paid),
            ("withdraw_shares", self.withdraw_shares),
        ]
    }

    pub fn long_balance(&self, mint_time: FixedPoint) -> FixedPoint {
        self.longs
            .get(&mint_time)
            .map_or(FixedPoint::ZERO, |long| long.balance)
    }

    pub fn short(&self, mint_time: FixedPoint) -> Option<&Short> {
        self.shorts.get(&mint_time)
    }

    /// Merge `deltas` into the wallet
    ///
    /// # Errors
    /// Same as [`Wallet::apply`]; the wallet is unchanged on error.
    pub fn update(&mut self, deltas: &WalletDeltas) -> AmmResult<()> {
        let next = self.apply(deltas)?;
        debug!(
            address = self.address,
            balance = %next.balance.amount,
            lp_tokens = %next.lp_tokens,
            longs = next.longs.len(),
            shorts = next.shorts.len(),
            "Wallet updated"
        );
        *self = next;
        Ok(())
    }

    /// The wallet `deltas` would produce, leaving `self` untouched
    ///
    /// # Errors
    /// - [`AmmError::WalletMismatch`] when the deltas belong to another wallet
    /// - [`AmmError::NegativePosition`] when a cohort balance would drop below
    ///   zero
    /// - [`AmmError::InvalidInput`] when the balance delta is not in base
    pub fn apply(&self, deltas: &WalletDeltas) -> AmmResult<Wallet> {
        if deltas.address != self.address {
            return Err(AmmError::WalletMismatch {
                wallet: self.address,
                deltas: deltas.address,
            });
        }
        if deltas.balance.unit != TokenType::Base {
            return Err(AmmError::invalid(format!(
                "wallet balance is held in base, got a delta in {}",
                deltas.balance.unit
            )));
        }

        let mut next = self.clone();
        next.balance.amount = next.balance.amount.checked_add(deltas.balance.amount)?;
        next.lp_tokens = next.lp_tokens.checked_add(deltas.lp_tokens)?;
        next.fees_paid = next.fees_paid.checked_add(deltas.fees_paid)?;
        next.withdraw_shares = next.withdraw_shares.checked_add(deltas.withdraw_shares)?;
        for (&mint_time, delta) in &deltas.longs {
            merge_long(&mut next.longs, mint_time, delta)?;
        }
        for (&mint_time, delta) in &deltas.shorts {
            merge_short(&mut next.shorts, mint_time, delta)?;
        }
        Ok(next)
    }
}

fn merge_long(
    longs: &mut BTreeMap<FixedPoint, Long>,
    mint_time: FixedPoint,
    delta: &Long,
) -> AmmResult<()> {
    let held = longs.get(&mint_time).map_or(FixedPoint::ZERO, |long| long.balance);
    let balance = settle(mint_time, held.checked_add(delta.balance)?)?;
    if balance.is_zero() {
        longs.remove(&mint_time);
    } else {
        longs.insert(mint_time, Long { balance });
    }
    Ok(())
}

/// Sum the balances; adding to a short re-weights its open share price by
/// balance, `(p_old * b_old + p_new * b_new) / (b_old + b_new)`
fn merge_short(
    shorts: &mut BTreeMap<FixedPoint, Short>,
    mint_time: FixedPoint,
    delta: &Short,
) -> AmmResult<()> {
    let Some(held) = shorts.get(&mint_time).copied() else {
        let balance = settle(mint_time, delta.balance)?;
        if !balance.is_zero() {
            shorts.insert(
                mint_time,
                Short {
                    balance,
                    open_share_price: delta.open_share_price,
                },
            );
        }
        return Ok(());
    };

    let balance = settle(mint_time, held.balance.checked_add(delta.balance)?)?;
    if balance.is_zero() {
        shorts.remove(&mint_time);
        return Ok(());
    }
    let open_share_price = if delta.balance.is_positive() {
        held.open_share_price
            .mul_down(held.balance)?
            .checked_add(delta.open_share_price.mul_down(delta.balance)?)?
            .div_down(balance)?
    } else {
        held.open_share_price
    };
    shorts.insert(
        mint_time,
        Short {
            balance,
            open_share_price,
        },
    );
    Ok(())
}

fn settle(mint_time: FixedPoint, balance: FixedPoint) -> AmmResult<FixedPoint> {
    if balance.is_negative() {
        return Err(AmmError::NegativePosition { mint_time, balance });
    }
    Ok(balance)
}
