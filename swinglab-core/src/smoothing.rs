//! Causal exponential smoothing over a scalar price stream.
//!
//! Recursive: S[t] = alpha * x[t] + (1 - alpha) * S[t-1]
//! Seed: S[0] = x[0] (bootstraps on the first sample, no warmup window).
//!
//! Callers feed defined samples only. A gap (absent price) is handled by not
//! calling `update` for that tick, which carries the prior state forward.

/// Lower bound for an alpha derived from a smoothing time constant.
pub const MIN_DERIVED_ALPHA: f64 = 0.001;

/// Upper bound for an alpha derived from a smoothing time constant.
pub const MAX_DERIVED_ALPHA: f64 = 0.5;

/// Stateful EMA smoother. One instance per tracked market.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaSmoother {
    alpha: f64,
    last: Option<f64>,
}

impl EmaSmoother {
    pub fn new(alpha: f64) -> Self {
        assert!(
            alpha > 0.0 && alpha <= 1.0,
            "EMA alpha must be in (0, 1], got {alpha}"
        );
        Self { alpha, last: None }
    }

    /// Fold one raw sample into the state and return the smoothed value.
    pub fn update(&mut self, raw: f64) -> f64 {
        let next = match self.last {
            None => raw,
            Some(prev) => self.alpha * raw + (1.0 - self.alpha) * prev,
        };
        self.last = Some(next);
        next
    }

    /// Most recent smoothed value, `None` before the first sample.
    pub fn last(&self) -> Option<f64> {
        self.last
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

/// Translate a smoothing time constant (minutes) into an equivalent per-sample alpha.
///
/// `alpha = 1 / max(1, sigma_minutes * samples_per_minute)`, clamped to
/// `[MIN_DERIVED_ALPHA, MAX_DERIVED_ALPHA]`. Smaller alpha means a smoother,
/// slower signal.
pub fn alpha_from_sigma(sigma_minutes: f64, samples_per_minute: f64) -> f64 {
    let sigma_points = sigma_minutes * samples_per_minute;
    let alpha = 1.0 / sigma_points.max(1.0);
    alpha.clamp(MIN_DERIVED_ALPHA, MAX_DERIVED_ALPHA)
}

/// Smooth a series with gaps. `None` entries stay `None` and leave the state untouched.
pub fn smooth_with_gaps(alpha: f64, raw: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut smoother = EmaSmoother::new(alpha);
    raw.iter()
        .map(|sample| sample.map(|p| smoother.update(p)))
        .collect()
}
