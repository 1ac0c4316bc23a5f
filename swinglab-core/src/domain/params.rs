//! Strategy parameter bundle shared read-only across backtests and sweep trials.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategy::{EntryBand, ExitPolicy};

/// Errors from parameter validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParamError {
    #[error("ema_alpha must be in (0, 1], got {0}")]
    Alpha(f64),
    #[error("min_start must be > 0 for ratio settlement, got {0}")]
    MinStart(f64),
    #[error("entry band [{min_start}, {max_start}] is empty or outside [0, 1]")]
    EntryBand { min_start: f64, max_start: f64 },
    #[error("gain_threshold must be >= 0, got {0}")]
    GainThreshold(f64),
    #[error("{name} must be in [0, 1], got {value}")]
    Fraction { name: &'static str, value: f64 },
}

/// Immutable configuration for one backtest or live session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyParams {
    /// Lowest first smoothed price at which a position is opened.
    pub min_start: f64,
    /// Highest first smoothed price at which a position is opened.
    pub max_start: f64,
    /// Minimum rise above start (price units) that qualifies a peak.
    pub gain_threshold: f64,
    /// Exit once gain falls to this share of the peak gain.
    pub fall_fraction: f64,
    /// Fraction of series length at which the stagnation check fires.
    pub halftime_fraction: f64,
    /// EMA responsiveness.
    pub ema_alpha: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            min_start: 0.14,
            max_start: 0.77,
            gain_threshold: 0.03,
            fall_fraction: 0.81,
            halftime_fraction: 1.0,
            ema_alpha: 0.25,
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(ParamError::Alpha(self.ema_alpha));
        }
        if !(self.min_start > 0.0) {
            return Err(ParamError::MinStart(self.min_start));
        }
        let band_ok = (0.0..=1.0).contains(&self.min_start)
            && (0.0..=1.0).contains(&self.max_start)
            && self.min_start <= self.max_start;
        if !band_ok {
            return Err(ParamError::EntryBand {
                min_start: self.min_start,
                max_start: self.max_start,
            });
        }
        if !(self.gain_threshold >= 0.0) {
            return Err(ParamError::GainThreshold(self.gain_threshold));
        }
        for (name, value) in [
            ("fall_fraction", self.fall_fraction),
            ("halftime_fraction", self.halftime_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ParamError::Fraction { name, value });
            }
        }
        Ok(())
    }

    pub fn entry_band(&self) -> EntryBand {
        EntryBand::new(self.min_start, self.max_start)
    }

    /// Exit policy for a series of known length (batch context).
    pub fn exit_policy_for_series(&self, series_len: usize) -> ExitPolicy {
        ExitPolicy::new(self.gain_threshold, self.fall_fraction)
            .with_stagnation_index(stagnation_index(series_len, self.halftime_fraction))
    }

    /// Exit policy without the stagnation check (live context).
    pub fn exit_policy(&self) -> ExitPolicy {
        ExitPolicy::new(self.gain_threshold, self.fall_fraction)
    }
}

/// `floor(series_len * halftime_fraction)`. May equal `series_len`, in which
/// case no tick ever matches and the check never fires.
pub fn stagnation_index(series_len: usize, halftime_fraction: f64) -> usize {
    (series_len as f64 * halftime_fraction).floor() as usize
}
