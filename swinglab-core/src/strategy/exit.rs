//! Exit triggers for an open position.
//!
//! Evaluated in fixed priority order, first match wins:
//! 1. Peak-drop: the gain reached the threshold, then fell back under it.
//! 2. Retracement: the peak cleared the threshold and the gain gave back a
//!    `fall_fraction` share of it.
//! 3. Stagnation (batch only): at one precomputed tick index the smoothed
//!    price is still below `start + gain_threshold`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    PeakDrop,
    Retracement,
    Stagnation,
    /// Series ended with the position still open.
    EndOfSeries,
    /// Live market stopped producing samples.
    Stale,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitReason::PeakDrop => "peak_drop",
            ExitReason::Retracement => "retracement",
            ExitReason::Stagnation => "stagnation",
            ExitReason::EndOfSeries => "end_of_series",
            ExitReason::Stale => "stale",
        };
        f.write_str(name)
    }
}

/// One decision tick as seen by the exit policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitCheck {
    pub smoothed: f64,
    pub start_price: f64,
    pub gain: f64,
    pub max_gain: f64,
    /// Position of the tick in the series; `None` in the live context.
    pub index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitPolicy {
    pub gain_threshold: f64,
    pub fall_fraction: f64,
    pub stagnation_index: Option<usize>,
}

impl ExitPolicy {
    pub fn new(gain_threshold: f64, fall_fraction: f64) -> Self {
        Self {
            gain_threshold,
            fall_fraction,
            stagnation_index: None,
        }
    }

    pub fn with_stagnation_index(mut self, index: usize) -> Self {
        self.stagnation_index = Some(index);
        self
    }

    pub fn evaluate(&self, check: &ExitCheck) -> Option<ExitReason> {
        let threshold = self.gain_threshold;

        if check.max_gain >= threshold && check.gain < threshold {
            return Some(ExitReason::PeakDrop);
        }
        if check.max_gain > threshold && check.gain <= check.max_gain * self.fall_fraction {
            return Some(ExitReason::Retracement);
        }
        if let (Some(at), Some(idx)) = (self.stagnation_index, check.index) {
            if idx == at && check.smoothed < check.start_price + threshold {
                return Some(ExitReason::Stagnation);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(gain: f64, max_gain: f64) -> ExitCheck {
        ExitCheck {
            smoothed: 0.30 + gain,
            start_price: 0.30,
            gain,
            max_gain,
            index: None,
        }
    }

    #[test]
    fn quiet_market_holds() {
        let policy = ExitPolicy::new(0.03, 0.81);
        assert_eq!(policy.evaluate(&check(0.0, 0.0)), None);
        assert_eq!(policy.evaluate(&check(0.02, 0.02)), None);
    }

    #[test]
    fn peak_drop_fires_under_threshold() {
        let policy = ExitPolicy::new(0.03, 0.81);
        assert_eq!(
            policy.evaluate(&check(0.029, 0.03)),
            Some(ExitReason::PeakDrop)
        );
    }

    #[test]
    fn retracement_fires_at_fraction_of_peak() {
        let policy = ExitPolicy::new(0.03, 0.81);
        assert_eq!(policy.evaluate(&check(0.082, 0.10)), None);
        assert_eq!(
            policy.evaluate(&check(0.08, 0.10)),
            Some(ExitReason::Retracement)
        );
    }

    #[test]
    fn peak_drop_takes_priority() {
        // Both triggers true: gain under threshold and under the retracement line.
        let policy = ExitPolicy::new(0.03, 0.81);
        assert_eq!(
            policy.evaluate(&check(0.01, 0.10)),
            Some(ExitReason::PeakDrop)
        );
    }

    #[test]
    fn stagnation_only_at_its_index() {
        let policy = ExitPolicy::new(0.03, 0.81).with_stagnation_index(5);
        let mut c = check(0.01, 0.01);
        c.index = Some(4);
        assert_eq!(policy.evaluate(&c), None);
        c.index = Some(5);
        assert_eq!(policy.evaluate(&c), Some(ExitReason::Stagnation));
        c.index = Some(6);
        assert_eq!(policy.evaluate(&c), None);
    }

    #[test]
    fn stagnation_spared_when_price_cleared_threshold() {
        let policy = ExitPolicy::new(0.03, 0.81).with_stagnation_index(2);
        let mut c = check(0.05, 0.05);
        c.index = Some(2);
        assert_eq!(policy.evaluate(&c), None);
    }

    #[test]
    fn live_policy_never_stagnates() {
        let policy = ExitPolicy::new(0.03, 0.81);
        let mut c = check(0.0, 0.0);
        c.index = Some(0);
        assert_eq!(policy.evaluate(&c), None);
    }
}
