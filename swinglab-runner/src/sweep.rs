//! Parameter sweep: exhaustive grid search scored by backtest bankroll.
//!
//! The grid is the Cartesian product of five half-open ranges
//! (`min_start`, `max_start`, `gain_threshold`, `fall_fraction`, `ema_alpha`)
//! with `halftime_fraction` held fixed; combinations with
//! `max_start <= min_start` are discarded. Combinations are split into
//! equal-size batches, one per worker, and scored on a dedicated rayon pool.
//! Batches arrive in completion order; the best configuration is the first
//! maximum in arrival order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use swinglab_core::domain::StrategyParams;

use crate::backtest::score;
use crate::config::{BacktestSettings, ConfigError};
use crate::data_loader::LoadedArchive;

/// Slack when counting range points, so `0.14 + 0.01` does not overshoot `0.15`.
const RANGE_EPSILON: f64 = 1e-9;

/// Decimal places kept on generated grid values.
const GRID_DECIMALS: i32 = 10;

/// Half-open range `[start, stop)` walked in `step` increments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl ParamRange {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    /// A range holding exactly `value`.
    pub fn single(value: f64) -> Self {
        Self::new(value, value + 1.0, 1.0)
    }

    pub fn len(&self) -> usize {
        if !(self.step > 0.0) || !(self.stop > self.start) {
            return 0;
        }
        ((self.stop - self.start) / self.step - RANGE_EPSILON)
            .ceil()
            .max(0.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> Vec<f64> {
        let scale = 10f64.powi(GRID_DECIMALS);
        (0..self.len())
            .map(|i| ((self.start + i as f64 * self.step) * scale).round() / scale)
            .collect()
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if !(self.step > 0.0) {
            return Err(ConfigError::Invalid {
                field,
                reason: format!("step must be > 0, got {}", self.step),
            });
        }
        if !(self.stop > self.start) {
            return Err(ConfigError::Invalid {
                field,
                reason: format!("stop {} must exceed start {}", self.stop, self.start),
            });
        }
        Ok(())
    }
}

/// Parameter grid: one range per swept field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub min_start: ParamRange,
    pub max_start: ParamRange,
    pub gain_threshold: ParamRange,
    pub fall_fraction: ParamRange,
    pub ema_alpha: ParamRange,
    pub halftime_fraction: f64,
}

impl SweepGrid {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.min_start.validate("sweep.min_start")?;
        self.max_start.validate("sweep.max_start")?;
        self.gain_threshold.validate("sweep.gain_threshold")?;
        self.fall_fraction.validate("sweep.fall_fraction")?;
        self.ema_alpha.validate("sweep.ema_alpha")?;
        if !(0.0..=1.0).contains(&self.halftime_fraction) {
            return Err(ConfigError::Invalid {
                field: "sweep.halftime_fraction",
                reason: format!("must be in [0, 1], got {}", self.halftime_fraction),
            });
        }
        Ok(())
    }

    /// Size of the full product, before discarding inverted entry bands.
    pub fn size(&self) -> usize {
        self.min_start.len()
            * self.max_start.len()
            * self.gain_threshold.len()
            * self.fall_fraction.len()
            * self.ema_alpha.len()
    }

    /// All valid combinations, in nested traversal order.
    pub fn generate(&self) -> Vec<StrategyParams> {
        let max_starts = self.max_start.values();
        let gains = self.gain_threshold.values();
        let falls = self.fall_fraction.values();
        let alphas = self.ema_alpha.values();

        let mut combos = Vec::new();
        for min_start in self.min_start.values() {
            for &max_start in &max_starts {
                if max_start <= min_start {
                    continue;
                }
                for &gain_threshold in &gains {
                    for &fall_fraction in &falls {
                        for &ema_alpha in &alphas {
                            combos.push(StrategyParams {
                                min_start,
                                max_start,
                                gain_threshold,
                                fall_fraction,
                                halftime_fraction: self.halftime_fraction,
                                ema_alpha,
                            });
                        }
                    }
                }
            }
        }
        combos
    }
}

/// Score of one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub params: StrategyParams,
    pub bankroll: f64,
}

/// A grid point whose backtest could not be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub params: StrategyParams,
    pub reason: String,
}

/// Progress update sent after each batch arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepProgress {
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    pub best: Option<SweepResult>,
    pub elapsed_secs: f64,
}

impl SweepProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 / self.total as f64 * 100.0).min(100.0)
    }
}

/// Final output of a sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Successful results, in arrival order.
    pub results: Vec<SweepResult>,
    pub failures: Vec<SweepFailure>,
    pub workers: usize,
    pub elapsed_secs: f64,
}

impl SweepReport {
    /// Highest bankroll; ties go to the earliest result in arrival order.
    pub fn best(&self) -> Option<&SweepResult> {
        best_of(&self.results)
    }
}

fn best_of(results: &[SweepResult]) -> Option<&SweepResult> {
    results.iter().fold(None, |best, r| match best {
        Some(b) if b.bankroll >= r.bankroll => Some(b),
        _ => Some(r),
    })
}

/// Errors that stop a sweep before it starts.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("sweep grid produced no valid combinations")]
    EmptyGrid,
    #[error("invalid sweep grid: {0}")]
    Grid(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Available hardware parallelism minus one, at least one.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

/// Run the sweep over `grid` against a preloaded archive.
///
/// # Arguments
/// - `workers`: pool size; each worker receives one batch.
/// - `progress_cb`: invoked on the calling thread after each batch arrives.
pub fn run_sweep(
    archive: &LoadedArchive,
    settings: &BacktestSettings,
    grid: &SweepGrid,
    workers: usize,
    progress_cb: Option<&dyn Fn(&SweepProgress)>,
) -> Result<SweepReport, SweepError> {
    grid.validate()?;
    let combos = grid.generate();
    if combos.is_empty() {
        return Err(SweepError::EmptyGrid);
    }

    let total = combos.len();
    let workers = workers.max(1);
    let chunk_size = total.div_ceil(workers);
    let batches: Vec<Vec<StrategyParams>> =
        combos.chunks(chunk_size).map(<[_]>::to_vec).collect();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;

    info!(
        combinations = total,
        workers,
        batch_size = chunk_size,
        games = archive.game_count(),
        "starting sweep"
    );

    let start = Instant::now();
    let (tx, rx) = mpsc::channel::<Vec<Trial>>();
    let mut report = SweepReport {
        results: Vec::with_capacity(total),
        workers,
        ..Default::default()
    };

    std::thread::scope(|scope| {
        scope.spawn(|| {
            pool.install(|| {
                batches.into_par_iter().for_each_with(tx, |tx, batch| {
                    // The receiver outlives every sender.
                    let _ = tx.send(run_batch(archive, settings, &batch));
                });
            });
        });

        let mut completed = 0;
        for batch in rx {
            completed += batch.len();
            for trial in batch {
                match trial {
                    Trial::Scored(result) => report.results.push(result),
                    Trial::Failed(failure) => {
                        warn!(params = ?failure.params, "sweep trial failed: {}", failure.reason);
                        report.failures.push(failure);
                    }
                }
            }
            if let Some(cb) = progress_cb {
                cb(&SweepProgress {
                    completed,
                    total,
                    failed: report.failures.len(),
                    best: best_of(&report.results).copied(),
                    elapsed_secs: start.elapsed().as_secs_f64(),
                });
            }
        }
    });

    report.elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        scored = report.results.len(),
        failed = report.failures.len(),
        elapsed_secs = report.elapsed_secs,
        "sweep complete"
    );
    Ok(report)
}

enum Trial {
    Scored(SweepResult),
    Failed(SweepFailure),
}

fn run_batch(
    archive: &LoadedArchive,
    settings: &BacktestSettings,
    batch: &[StrategyParams],
) -> Vec<Trial> {
    batch
        .iter()
        .map(|params| {
            let outcome = catch_unwind(AssertUnwindSafe(|| score(archive, params, settings)));
            match outcome {
                Ok(Ok(bankroll)) => Trial::Scored(SweepResult {
                    params: *params,
                    bankroll,
                }),
                Ok(Err(e)) => Trial::Failed(SweepFailure {
                    params: *params,
                    reason: e.to_string(),
                }),
                Err(payload) => Trial::Failed(SweepFailure {
                    params: *params,
                    reason: panic_message(payload.as_ref()),
                }),
            }
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
