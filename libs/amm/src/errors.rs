//! Error taxonomy for the AMM engine
//!
//! Every failure is raised synchronously where it is detected and never
//! retried internally. Callers that need a coarse policy (skip the trade,
//! abort the run, report a divergence) match on [`AmmError::kind`].

use thiserror::Error;
use types::{FixedPoint, FixedPointError};

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed action or out-of-range trade input
    Validation,
    /// Reserve, fee or curve invariant broken
    InvariantViolation,
    /// Fixed-point overflow, division by zero or out-of-domain exponent
    Arithmetic,
    /// Wallet ledger would end up in an impossible state
    State,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmmError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Unknown {what}: '{name}'")]
    UnknownName { what: &'static str, name: String },

    #[error("{action} requires a mint time")]
    MissingMintTime { action: &'static str },

    #[error("Mint time {mint_time} is later than market time {market_time}")]
    MintTimeInFuture {
        mint_time: FixedPoint,
        market_time: FixedPoint,
    },

    #[error("Wallet {address} holds no short minted at {mint_time}")]
    UnknownPosition { address: u64, mint_time: FixedPoint },

    #[error("Market already initialized: share reserves {share_reserves}, bond reserves {bond_reserves}")]
    AlreadyInitialized {
        share_reserves: FixedPoint,
        bond_reserves: FixedPoint,
    },

    #[error("Spot price is undefined with zero share reserves")]
    UndefinedSpotPrice,

    #[error("Market field {field} = {value} is below the negative precision threshold")]
    NegativeMarketValue {
        field: &'static str,
        value: FixedPoint,
    },

    #[error("Trade assertion failed: {message}")]
    AssertionFailed { message: String },

    #[error("Curve insolvent: {message}")]
    CurveInsolvent { message: String },

    #[error(transparent)]
    Arithmetic(#[from] FixedPointError),

    #[error("Position minted at {mint_time} would hold negative balance {balance}")]
    NegativePosition {
        mint_time: FixedPoint,
        balance: FixedPoint,
    },

    #[error("Wallet address mismatch: wallet {wallet}, deltas {deltas}")]
    WalletMismatch { wallet: u64, deltas: u64 },
}

impl AmmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmmError::InvalidInput { .. }
            | AmmError::UnknownName { .. }
            | AmmError::MissingMintTime { .. }
            | AmmError::MintTimeInFuture { .. }
            | AmmError::UnknownPosition { .. }
            | AmmError::AlreadyInitialized { .. }
            | AmmError::UndefinedSpotPrice => ErrorKind::Validation,
            AmmError::NegativeMarketValue { .. }
            | AmmError::AssertionFailed { .. }
            | AmmError::CurveInsolvent { .. } => ErrorKind::InvariantViolation,
            AmmError::Arithmetic(_) => ErrorKind::Arithmetic,
            AmmError::NegativePosition { .. } | AmmError::WalletMismatch { .. } => ErrorKind::State,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        AmmError::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn assertion(message: impl Into<String>) -> Self {
        AmmError::AssertionFailed {
            message: message.into(),
        }
    }

    pub(crate) fn insolvent(message: impl Into<String>) -> Self {
        AmmError::CurveInsolvent {
            message: message.into(),
        }
    }
}

pub type AmmResult<T> = Result<T, AmmError>;
