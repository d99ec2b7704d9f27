//! # Hyperdrive Market Configuration
//!
//! This crate loads the parameters of a simulated market and builds the
//! [`Market`](hyperdrive_amm::Market) they describe.
//!
//! ## Features
//!
//! - **Layered Sources**: base TOML file, optional per-environment overlay,
//!   `HYPERDRIVE_*` environment variables
//! - **Validation**: fee, rate and duration ranges checked before any market
//!   is built
//! - **Market Seeding**: reserves sized for a target liquidity and fixed rate,
//!   or an empty pool for `initialize_market`
//!
//! ## Usage
//!
//! ```rust
//! use hyperdrive_config::{build_market, MarketConfig};
//!
//! let config = MarketConfig::from_toml_str(r#"
//! pricing_model_name = "Hyperdrive"
//! target_fixed_rate = 0.05
//! num_position_days = 180
//! "#).unwrap();
//!
//! let market = build_market(&config).unwrap();
//! assert!(market.market_state().share_reserves.is_positive());
//! ```

pub mod market_config;

pub use market_config::{build_market, empty_market, MarketConfig, ENV_PREFIX};
