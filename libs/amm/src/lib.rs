//! # Hyperdrive AMM Library - Fixed-Rate Time-Decaying Market Engine
//!
//! ## Purpose
//!
//! Deterministic reference engine for a fixed-rate bond AMM. Bonds (principal
//! tokens) trade against a yield-bearing base asset on a curve whose shape
//! decays toward a flat 1:1 price as the bonds approach maturity. The library
//! prices trades, applies them to a reserve ledger and emits per-agent wallet
//! deltas, all in 18-decimal fixed point.
//!
//! ## Integration Points
//!
//! - **Input Sources**: market parameters from `hyperdrive-config`, trade
//!   actions from a simulation driver or a fuzz harness
//! - **Output Destinations**: wallet deltas for the agent that traded, the
//!   updated [`MarketState`] for reporting and cross-checking
//! - **Curves**: Element (legacy), YieldSpace and Hyperdrive
//!   (flat-plus-curve), selected through [`PricingModelKind`]
//! - **Precision**: [`FixedPoint`] with 256-bit intermediates; values within
//!   [`PRECISION_THRESHOLD`] below zero snap to zero
//!
//! ## Architecture Role
//!
//! - [`time`]: position durations and time-to-maturity conversions
//! - [`pricing`]: stateless curve solvers, LP math and max-trade bisections
//! - [`market_state`]: the reserve ledger and its checked transition
//! - [`market`]: trade routing and the single writer of the market state
//! - [`wallet`]: per-agent balances and mint-time-keyed positions
//!
//! See [`architecture_diagram()`] for visual representation of the data flow.
//!
//! ## Concurrency
//!
//! Single-threaded and synchronous. The market is path dependent, so callers
//! submitting trades from several agents must serialize them.

pub mod errors;
pub mod market;
pub mod market_state;
pub mod pricing;
pub mod time;
pub mod trade;
pub mod wallet;

pub use errors::{AmmError, AmmResult, ErrorKind};
pub use market::{Market, MarketAction, MarketActionType};
pub use market_state::{MarketDeltas, MarketState, MAX_RESERVES_DIFFERENCE, PRECISION_THRESHOLD};
pub use pricing::{
    calc_apr_from_spot_price, calc_spot_price_from_apr, ElementPricingModel,
    HyperdrivePricingModel, PricingModel, PricingModelKind, YieldSpacePricingModel,
};
pub use time::{calc_time_stretch, years_remaining, StretchedTime, DAYS_PER_YEAR};
pub use trade::{LpQuote, Quantity, TokenType, TradeBreakdown, TradeDeltas, TradeResult};
pub use wallet::{Long, Short, Wallet, WalletDeltas};

pub use types::FixedPoint;

/// Architecture diagram showing how a trade flows through the engine
#[cfg_attr(doc, aquamarine::aquamarine)]
/// ```mermaid
/// graph LR
///     subgraph Input["📥 Actions"]
///         MA[MarketAction]
///         WL[Agent Wallet]
///     end
///
///     subgraph Market["🏦 Market"]
///         TR[trade_and_update]
///         TM[Time Remaining]
///         UM[update_market]
///     end
///
///     subgraph Pricing["🧮 Pricing Model"]
///         IA[Input Assertions]
///         CV[Curve Solver]
///         OA[Output Assertions]
///     end
///
///     subgraph Output["📤 Deltas"]
///         MD[MarketDeltas]
///         WD[WalletDeltas]
///         MS[MarketState]
///     end
///
///     MA --> TR
///     WL --> TR
///     TR --> TM
///     TM --> IA
///     IA --> CV
///     CV --> OA
///     OA --> MD
///     OA --> WD
///     MD --> UM
///     UM --> MS
///     WD --> WL
///
///     style Input fill:#e1f5fe
///     style Market fill:#fff3e0
///     style Pricing fill:#f3e5f5
///     style Output fill:#e8f5e9
/// ```
pub fn architecture_diagram() {
    // This function exists solely for documentation purposes
    // The diagram is rendered by aquamarine in rustdoc
}
