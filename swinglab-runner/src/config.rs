//! TOML configuration for the backtest, sweep and live contexts.
//!
//! Every table and field is optional; an empty document yields the defaults.
//!
//! ```toml
//! [strategy]
//! ema_alpha = 0.3
//!
//! [backtest]
//! archive_dir = "filter"
//! starting_bankroll = 20.0
//! stake = 2.0
//!
//! [sweep.ema_alpha]
//! start = 0.20
//! stop = 0.40
//! step = 0.01
//!
//! [live]
//! active_dir = "active_games"
//! sigma_minutes = 3.32
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use swinglab_core::domain::{ParamError, StrategyParams};
use swinglab_core::smoothing::alpha_from_sigma;

use crate::sweep::{ParamRange, SweepGrid};

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid strategy parameters: {0}")]
    Params(#[from] ParamError),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub strategy: StrategyParams,
    pub backtest: BacktestSettings,
    pub sweep: SweepSettings,
    pub live: LiveSettings,
}

impl AppConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        self.backtest.validate()?;
        self.sweep.grid().validate()?;
        self.live.strategy_params().validate()?;
        if self.live.stake <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "live.stake",
                reason: format!("must be > 0, got {}", self.live.stake),
            });
        }
        if self.live.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "live.tick_interval_ms",
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }
}

/// Batch backtest settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestSettings {
    /// Root of the weekly archive (one sub-directory per week).
    pub archive_dir: PathBuf,
    pub starting_bankroll: f64,
    /// Flat stake per opened position.
    pub stake: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from("filter"),
            starting_bankroll: 20.0,
            stake: 2.0,
        }
    }
}

impl BacktestSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.stake > 0.0) {
            return Err(ConfigError::Invalid {
                field: "backtest.stake",
                reason: format!("must be > 0, got {}", self.stake),
            });
        }
        Ok(())
    }
}

/// Sweep grid and execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepSettings {
    pub min_start: ParamRange,
    pub max_start: ParamRange,
    pub gain_threshold: ParamRange,
    pub fall_fraction: ParamRange,
    pub ema_alpha: ParamRange,
    /// Held fixed across the grid.
    pub halftime_fraction: f64,
    /// Worker threads; `None` means available parallelism minus one.
    pub workers: Option<usize>,
    /// Results table destination.
    pub output: PathBuf,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            min_start: ParamRange::new(0.14, 0.15, 0.01),
            max_start: ParamRange::new(0.71, 0.73, 0.01),
            gain_threshold: ParamRange::new(0.02, 0.03, 0.01),
            fall_fraction: ParamRange::new(0.79, 0.81, 0.01),
            ema_alpha: ParamRange::new(0.20, 0.40, 0.01),
            halftime_fraction: 1.0,
            workers: None,
            output: PathBuf::from("sweeps/sweep_ema_results.csv"),
        }
    }
}

impl SweepSettings {
    pub fn grid(&self) -> SweepGrid {
        SweepGrid {
            min_start: self.min_start,
            max_start: self.max_start,
            gain_threshold: self.gain_threshold,
            fall_fraction: self.fall_fraction,
            ema_alpha: self.ema_alpha,
            halftime_fraction: self.halftime_fraction,
        }
    }
}

/// Live runner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveSettings {
    /// Folder of `<ticker>.jsonl` feeds written by the collector.
    pub active_dir: PathBuf,
    pub stake: f64,
    pub min_start: f64,
    pub max_start: f64,
    pub gain_threshold: f64,
    pub fall_fraction: f64,
    /// Smoothing time constant in minutes.
    pub sigma_minutes: f64,
    pub samples_per_minute: f64,
    /// Explicit alpha; overrides the sigma-derived value when set.
    pub ema_alpha: Option<f64>,
    pub tick_interval_ms: u64,
    pub refresh_interval_secs: u64,
    /// Force-close an open position after this long without a new sample.
    /// Zero disables the check.
    pub stale_after_secs: u64,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            active_dir: PathBuf::from("active_games"),
            stake: 10.0,
            min_start: 0.14,
            max_start: 0.77,
            gain_threshold: 0.03,
            fall_fraction: 0.81,
            sigma_minutes: 3.32,
            samples_per_minute: 60.0,
            ema_alpha: None,
            tick_interval_ms: 1_000,
            refresh_interval_secs: 10,
            stale_after_secs: 900,
        }
    }
}

impl LiveSettings {
    pub fn alpha(&self) -> f64 {
        self.ema_alpha
            .unwrap_or_else(|| alpha_from_sigma(self.sigma_minutes, self.samples_per_minute))
    }

    /// Live parameters as a strategy bundle. The stagnation check does not
    /// apply live, so `halftime_fraction` is left at its default.
    pub fn strategy_params(&self) -> StrategyParams {
        StrategyParams {
            min_start: self.min_start,
            max_start: self.max_start,
            gain_threshold: self.gain_threshold,
            fall_fraction: self.fall_fraction,
            ema_alpha: self.alpha(),
            ..StrategyParams::default()
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_after_secs > 0).then(|| Duration::from_secs(self.stale_after_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.backtest.starting_bankroll, 20.0);
        assert_eq!(config.live.stake, 10.0);
    }

    #[test]
    fn partial_tables_merge_with_defaults() {
        let config = AppConfig::from_toml(
            r#"
[strategy]
ema_alpha = 0.3

[backtest]
archive_dir = "archive"

[sweep.ema_alpha]
start = 0.2
stop = 0.3
step = 0.05

[live]
stale_after_secs = 0
"#,
        )
        .unwrap();
        assert_eq!(config.strategy.ema_alpha, 0.3);
        assert_eq!(config.strategy.min_start, 0.14);
        assert_eq!(config.backtest.archive_dir, PathBuf::from("archive"));
        assert_eq!(config.backtest.stake, 2.0);
        assert_eq!(config.sweep.ema_alpha.values(), vec![0.2, 0.25]);
        assert_eq!(config.live.stale_after(), None);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            AppConfig::from_toml("[strategy]\nema = 0.3\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn zero_entry_floor_rejected() {
        assert!(matches!(
            AppConfig::from_toml("[strategy]\nmin_start = 0.0\n"),
            Err(ConfigError::Params(ParamError::MinStart(_)))
        ));
    }

    #[test]
    fn invalid_strategy_rejected() {
        assert!(matches!(
            AppConfig::from_toml("[strategy]\nema_alpha = 1.5\n"),
            Err(ConfigError::Params(_))
        ));
    }

    #[test]
    fn live_alpha_derives_from_sigma() {
        let live = LiveSettings::default();
        assert!((live.alpha() - 1.0 / 199.2).abs() < 1e-12);
        let live = LiveSettings {
            ema_alpha: Some(0.2),
            ..Default::default()
        };
        assert_eq!(live.alpha(), 0.2);
        assert_eq!(live.strategy_params().ema_alpha, 0.2);
    }
}
