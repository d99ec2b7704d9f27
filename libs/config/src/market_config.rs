//! Market Configuration Module
//!
//! Loads market parameters from TOML with environment-specific overrides and
//! turns them into a ready-to-trade [`Market`].

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use hyperdrive_amm::{
    calc_time_stretch, Market, MarketState, PricingModel, PricingModelKind, StretchedTime,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use types::FixedPoint;

/// Prefix of environment variables that override file values,
/// e.g. `HYPERDRIVE_TRADE_FEE_PERCENT=0.1`
pub const ENV_PREFIX: &str = "HYPERDRIVE";

/// Parameters of one simulated market
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MarketConfig {
    /// `Element`, `YieldSpace` or `Hyperdrive`, any case
    pub pricing_model_name: String,
    pub trade_fee_percent: f64,
    pub redemption_fee_percent: f64,
    /// Annual fixed rate the pool is seeded at
    pub target_fixed_rate: f64,
    pub num_position_days: u32,
    /// Base value of the seeded share reserves
    pub target_liquidity: f64,
    pub init_share_price: f64,
    /// Annual yield of the underlying vault
    pub variable_apr: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            pricing_model_name: "Hyperdrive".to_string(),
            trade_fee_percent: 0.05,
            redemption_fee_percent: 0.05,
            target_fixed_rate: 0.1,
            num_position_days: 90,
            target_liquidity: 1_000_000.0,
            init_share_price: 1.0,
            variable_apr: 0.05,
        }
    }
}

impl MarketConfig {
    /// Load configuration from a file with environment overrides
    ///
    /// Sources, later ones winning:
    /// 1. `path` (required)
    /// 2. `<dir of path>/environments/<environment>.toml` (optional)
    /// 3. `HYPERDRIVE_*` environment variables
    pub fn load(path: &str, environment: Option<&str>) -> Result<Self> {
        Self::build(path, environment, None)
    }

    /// Same as [`MarketConfig::load`], reading overrides from `vars` instead
    /// of the process environment
    pub fn load_with_vars(
        path: &str,
        environment: Option<&str>,
        vars: HashMap<String, String>,
    ) -> Result<Self> {
        Self::build(path, environment, Some(vars))
    }

    fn build(
        path: &str,
        environment: Option<&str>,
        vars: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let base = PathBuf::from(
            shellexpand::full(path)
                .with_context(|| format!("Failed to expand config path {path}"))?
                .as_ref(),
        );
        info!("Loading market config: {:?}", base);

        let mut builder = Config::builder().add_source(File::from(base.as_path()).required(true));

        if let Some(env) = environment {
            let env_file = base
                .parent()
                .unwrap_or(Path::new("."))
                .join("environments")
                .join(format!("{env}.toml"));
            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        let mut overrides = Environment::with_prefix(ENV_PREFIX).try_parsing(true);
        if let Some(vars) = vars {
            overrides = overrides.source(Some(vars.into_iter().collect()));
        }
        builder = builder.add_source(overrides);

        let config: MarketConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize market configuration")?;
        config.validate()?;
        debug!(?config, "Market config loaded");
        Ok(config)
    }

    /// Parse an embedded TOML document; omitted keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: MarketConfig =
            toml::from_str(contents).context("Failed to parse market configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document through the layered builder without any file
    /// or environment sources
    pub fn from_config_str(contents: &str) -> Result<Self> {
        let config: MarketConfig = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize market configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no market can be built from
    pub fn validate(&self) -> Result<()> {
        self.pricing_model()?;
        for (name, value) in [
            ("trade_fee_percent", self.trade_fee_percent),
            ("redemption_fee_percent", self.redemption_fee_percent),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{name} must be in [0, 1], got {value}");
            }
        }
        if self.num_position_days == 0 {
            bail!("num_position_days must be positive");
        }
        if !(self.target_fixed_rate > 0.0) {
            bail!("target_fixed_rate must be positive, got {}", self.target_fixed_rate);
        }
        if !(self.target_liquidity > 0.0) {
            bail!("target_liquidity must be positive, got {}", self.target_liquidity);
        }
        if !(self.init_share_price >= 1.0) {
            bail!("init_share_price must be at least 1, got {}", self.init_share_price);
        }
        if !(self.variable_apr >= 0.0) {
            bail!("variable_apr must be non-negative, got {}", self.variable_apr);
        }
        Ok(())
    }

    pub fn pricing_model(&self) -> Result<PricingModelKind> {
        self.pricing_model_name
            .parse()
            .with_context(|| format!("Invalid pricing_model_name {:?}", self.pricing_model_name))
    }

    /// Term of a new position: `days = normalizing_constant = num_position_days`,
    /// stretched for the target rate
    pub fn position_duration(&self) -> Result<StretchedTime> {
        let days = FixedPoint::from_integer(i64::from(self.num_position_days));
        let time_stretch = calc_time_stretch(fixed("target_fixed_rate", self.target_fixed_rate)?)?;
        Ok(StretchedTime::new(days, time_stretch, days)?)
    }

    fn empty_state(&self) -> Result<MarketState> {
        let init_share_price = fixed("init_share_price", self.init_share_price)?;
        Ok(MarketState {
            variable_apr: fixed("variable_apr", self.variable_apr)?,
            ..MarketState::empty(
                init_share_price,
                fixed("trade_fee_percent", self.trade_fee_percent)?,
                fixed("redemption_fee_percent", self.redemption_fee_percent)?,
            )
        })
    }
}

/// Market seeded with `target_liquidity` base at the annual `target_fixed_rate`
pub fn build_market(config: &MarketConfig) -> Result<Market> {
    config.validate()?;
    let pricing_model = config.pricing_model()?;
    let position_duration = config.position_duration()?;
    let mut market_state = config.empty_state()?;

    let target_rate = fixed("target_fixed_rate", config.target_fixed_rate)?;
    let target_liquidity = fixed("target_liquidity", config.target_liquidity)?;
    let (share_reserves, bond_reserves) = pricing_model.calc_liquidity(
        &market_state,
        target_liquidity,
        target_rate,
        &position_duration,
    )?;
    market_state.share_reserves = share_reserves;
    market_state.bond_reserves = bond_reserves;
    market_state.lp_total_supply = target_liquidity.div_down(market_state.init_share_price)?;

    info!(
        model = pricing_model.model_name(),
        share_reserves = %share_reserves,
        bond_reserves = %bond_reserves,
        target_rate = %target_rate,
        time_stretch = %position_duration.time_stretch(),
        "Seeded market from config"
    );
    Ok(Market::new(pricing_model, market_state, position_duration))
}

/// Market with the configured parameters and no reserves, ready for
/// `initialize_market`
pub fn empty_market(config: &MarketConfig) -> Result<Market> {
    config.validate()?;
    Ok(Market::new(
        config.pricing_model()?,
        config.empty_state()?,
        config.position_duration()?,
    ))
}

/// Exact decimal conversion through the shortest round-trip representation
fn fixed(name: &str, value: f64) -> Result<FixedPoint> {
    FixedPoint::from_decimal_str(&value.to_string())
        .with_context(|| format!("{name} = {value} is not representable in fixed point"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MarketConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pricing_model().unwrap(), PricingModelKind::default());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let bad_fee = MarketConfig {
            trade_fee_percent: 1.5,
            ..MarketConfig::default()
        };
        assert!(bad_fee.validate().is_err());

        let no_days = MarketConfig {
            num_position_days: 0,
            ..MarketConfig::default()
        };
        assert!(no_days.validate().is_err());

        let low_price = MarketConfig {
            init_share_price: 0.9,
            ..MarketConfig::default()
        };
        assert!(low_price.validate().is_err());

        let unknown = MarketConfig {
            pricing_model_name: "uniswap".to_string(),
            ..MarketConfig::default()
        };
        assert!(unknown.validate().is_err());
    }

    #[test]
    fn test_fixed_uses_shortest_decimal() {
        assert_eq!(fixed("rate", 0.05).unwrap().raw_value(), 50_000_000_000_000_000);
        assert_eq!(fixed("days", 90.0).unwrap(), FixedPoint::from_integer(90));
    }

    #[test]
    fn test_from_toml_str_fills_defaults() {
        let config = MarketConfig::from_toml_str(
            r#"
pricing_model_name = "yield_space"
target_fixed_rate = 0.05
"#,
        )
        .unwrap();
        assert_eq!(config.pricing_model_name, "yield_space");
        assert_eq!(config.target_fixed_rate, 0.05);
        assert_eq!(config.num_position_days, 90);
        assert_eq!(config.target_liquidity, 1_000_000.0);
    }

    #[test]
    fn test_position_duration_spans_full_term() {
        let duration = MarketConfig::default().position_duration().unwrap();
        assert_eq!(duration.days(), FixedPoint::from_integer(90));
        assert_eq!(duration.normalized_time(), FixedPoint::ONE);
    }
}
