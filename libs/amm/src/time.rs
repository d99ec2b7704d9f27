//! Position duration and time-to-maturity conversions
//!
//! Time enters the curve three ways: raw days, days normalized by a
//! constant (usually the position duration), and the normalized value divided
//! by the time stretch, which is the exponent `tau` of the invariant.
//! Rates are quoted per year, so rate terms use days over 365 instead.
//! Market time and mint times are measured in years.

use crate::errors::{AmmError, AmmResult};
use serde::{Deserialize, Serialize};
use types::FixedPoint;

pub const DAYS_PER_YEAR: FixedPoint = FixedPoint::from_integer(365);

/// 3.09396, numerator of the time stretch fit
const TIME_STRETCH_NUMERATOR: FixedPoint = FixedPoint::from_raw(3_093_960_000_000_000_000);

/// 0.02789, slope of the time stretch fit per percentage point of APR
const TIME_STRETCH_SLOPE: FixedPoint = FixedPoint::from_raw(27_890_000_000_000_000);

/// Remaining duration of a position as seen by the curve
///
/// Construction validates the parameters and caches the derived values, so a
/// `StretchedTime` handed to a pricing call cannot change underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StretchedTimeParams", into = "StretchedTimeParams")]
pub struct StretchedTime {
    days: FixedPoint,
    time_stretch: FixedPoint,
    normalizing_constant: FixedPoint,
    normalized_time: FixedPoint,
    stretched_time: FixedPoint,
    annualized_time: FixedPoint,
}

#[derive(Serialize, Deserialize)]
struct StretchedTimeParams {
    days: FixedPoint,
    time_stretch: FixedPoint,
    normalizing_constant: FixedPoint,
}

impl StretchedTime {
    /// # Arguments
    /// * `days` - Days remaining until maturity, must be non-negative
    /// * `time_stretch` - Curve shape parameter, must be positive
    /// * `normalizing_constant` - Days that map to a normalized time of one
    pub fn new(
        days: FixedPoint,
        time_stretch: FixedPoint,
        normalizing_constant: FixedPoint,
    ) -> AmmResult<Self> {
        if days.is_negative() {
            return Err(AmmError::invalid(format!("days must be non-negative, got {days}")));
        }
        if !time_stretch.is_positive() {
            return Err(AmmError::invalid(format!(
                "time stretch must be positive, got {time_stretch}"
            )));
        }
        if !normalizing_constant.is_positive() {
            return Err(AmmError::invalid(format!(
                "normalizing constant must be positive, got {normalizing_constant}"
            )));
        }
        let normalized_time = norm_days(days, normalizing_constant)?;
        let stretched_time = stretch_time(normalized_time, time_stretch)?;
        let annualized_time = norm_days(days, DAYS_PER_YEAR)?;
        Ok(Self {
            days,
            time_stretch,
            normalizing_constant,
            normalized_time,
            stretched_time,
            annualized_time,
        })
    }

    pub fn days(&self) -> FixedPoint {
        self.days
    }

    pub fn time_stretch(&self) -> FixedPoint {
        self.time_stretch
    }

    pub fn normalizing_constant(&self) -> FixedPoint {
        self.normalizing_constant
    }

    /// `days / normalizing_constant`
    pub fn normalized_time(&self) -> FixedPoint {
        self.normalized_time
    }

    /// `normalized_time / time_stretch`, the curve exponent `tau`
    pub fn stretched_time(&self) -> FixedPoint {
        self.stretched_time
    }

    /// Same curve parameters with a different number of days remaining
    pub fn with_days(&self, days: FixedPoint) -> AmmResult<Self> {
        Self::new(days, self.time_stretch, self.normalizing_constant)
    }

    /// The full term: `days == normalizing_constant`
    pub fn full_term(&self) -> AmmResult<Self> {
        self.with_days(self.normalizing_constant)
    }

    /// `days / 365`, the time an annual rate accrues over
    pub fn annualized_time(&self) -> FixedPoint {
        self.annualized_time
    }
}

/// Days normalized by the given constant
pub fn norm_days(days: FixedPoint, normalizing_constant: FixedPoint) -> AmmResult<FixedPoint> {
    Ok(days.div_down(normalizing_constant)?)
}

/// Inverse of [`norm_days`]
pub fn unnorm_days(
    normed_days: FixedPoint,
    normalizing_constant: FixedPoint,
) -> AmmResult<FixedPoint> {
    Ok(normed_days.mul_down(normalizing_constant)?)
}

pub fn stretch_time(time: FixedPoint, time_stretch: FixedPoint) -> AmmResult<FixedPoint> {
    Ok(time.div_down(time_stretch)?)
}

pub fn unstretch_time(stretched_time: FixedPoint, time_stretch: FixedPoint) -> AmmResult<FixedPoint> {
    Ok(stretched_time.mul_down(time_stretch)?)
}

/// Days remaining to the stretched curve exponent
pub fn days_to_time_remaining(
    days_remaining: FixedPoint,
    time_stretch: FixedPoint,
    normalizing_constant: FixedPoint,
) -> AmmResult<FixedPoint> {
    stretch_time(norm_days(days_remaining, normalizing_constant)?, time_stretch)
}

/// Stretched curve exponent back to days remaining
pub fn time_to_days_remaining(
    time_remaining: FixedPoint,
    time_stretch: FixedPoint,
    normalizing_constant: FixedPoint,
) -> AmmResult<FixedPoint> {
    unnorm_days(unstretch_time(time_remaining, time_stretch)?, normalizing_constant)
}

/// Years left until a cohort minted at `mint_time` matures
///
/// Matured cohorts report zero. A mint time later than the market time is a
/// validation error.
///
/// # Arguments
/// * `market_time` - Current market time in years
/// * `mint_time` - Mint time of the cohort in years
/// * `position_duration_years` - Full position term in years
pub fn years_remaining(
    market_time: FixedPoint,
    mint_time: FixedPoint,
    position_duration_years: FixedPoint,
) -> AmmResult<FixedPoint> {
    if mint_time > market_time {
        return Err(AmmError::MintTimeInFuture {
            mint_time,
            market_time,
        });
    }
    let elapsed = market_time.checked_sub(mint_time)?;
    let remaining = position_duration_years.checked_sub(elapsed)?;
    Ok(remaining.max(FixedPoint::ZERO))
}

/// Time stretch that targets the given APR: `3.09396 / (0.02789 * apr * 100)`
pub fn calc_time_stretch(apr: FixedPoint) -> AmmResult<FixedPoint> {
    if !apr.is_positive() {
        return Err(AmmError::invalid(format!(
            "time stretch needs a positive APR, got {apr}"
        )));
    }
    let apr_percent = apr.mul_down(FixedPoint::from_integer(100))?;
    let denominator = TIME_STRETCH_SLOPE.mul_down(apr_percent)?;
    Ok(TIME_STRETCH_NUMERATOR.div_down(denominator)?)
}

impl TryFrom<StretchedTimeParams> for StretchedTime {
    type Error = AmmError;

    fn try_from(params: StretchedTimeParams) -> Result<Self, Self::Error> {
        StretchedTime::new(params.days, params.time_stretch, params.normalizing_constant)
    }
}

impl From<StretchedTime> for StretchedTimeParams {
    fn from(time: StretchedTime) -> Self {
        Self {
            days: time.days,
            time_stretch: time.time_stretch,
            normalizing_constant: time.normalizing_constant,
        }
    }
}
