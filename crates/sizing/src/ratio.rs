use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a projection could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioFault {
    /// External benchmark for the prior period is zero.
    ZeroBenchmark,
    /// Internal (bridge) figure for the prior period is zero.
    ZeroBridge,
}

impl fmt::Display for RatioFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroBenchmark => write!(f, "prior-year benchmark is zero"),
            Self::ZeroBridge => write!(f, "prior-year bridge volume is zero"),
        }
    }
}

/// Fixed correction applied to a bridge series' baseline year, e.g. 12/11
/// for a panel missing one month of its prior-year reporting.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ScaleFactor {
    pub numerator: f64,
    pub denominator: f64,
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self {
            numerator: 1.0,
            denominator: 1.0,
        }
    }
}

impl ScaleFactor {
    pub fn apply(&self, value: f64) -> f64 {
        value * self.numerator / self.denominator
    }

    pub fn is_identity(&self) -> bool {
        self.numerator == self.denominator
    }
}

/// Project a prior-period benchmark onto the current period, using internal
/// growth as the bridge:
///
/// ```text
/// ratio    = internal_prior / external_prior
/// estimate = internal_current / ratio
/// ```
pub fn project(
    internal_current: f64,
    internal_prior: f64,
    external_prior: f64,
) -> Result<f64, RatioFault> {
    if external_prior == 0.0 {
        return Err(RatioFault::ZeroBenchmark);
    }
    if internal_prior == 0.0 {
        return Err(RatioFault::ZeroBridge);
    }
    let ratio = internal_prior / external_prior;
    Ok(internal_current / ratio)
}

/// [`project`] with the bridge's prior-period figure corrected by `scale`
/// first.
pub fn project_with_baseline(
    internal_current: f64,
    internal_prior: f64,
    external_prior: f64,
    scale: ScaleFactor,
) -> Result<f64, RatioFault> {
    project(internal_current, scale.apply(internal_prior), external_prior)
}
