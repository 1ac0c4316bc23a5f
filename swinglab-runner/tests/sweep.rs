//! Integration tests for the grid sweep.

use std::cell::{Cell, RefCell};
use std::path::Path;

use swinglab_runner::backtest::score;
use swinglab_runner::config::BacktestSettings;
use swinglab_runner::data_loader::{load_archive, LoadedArchive};
use swinglab_runner::export::{export_sweep_csv, write_file};
use swinglab_runner::sweep::{run_sweep, ParamRange, SweepError, SweepGrid};
use tempfile::TempDir;

fn write_market(week: &Path, name: &str, cents: &[i64]) {
    std::fs::create_dir_all(week).unwrap();
    let records: Vec<String> = cents
        .iter()
        .enumerate()
        .map(|(i, c)| format!(r#"{{"time":"2025-09-14T17:00:{i:02}Z","price_cents":{c}}}"#))
        .collect();
    std::fs::write(
        week.join(format!("{name}.json")),
        format!("[{}]", records.join(",")),
    )
    .unwrap();
}

fn fixture_archive(dir: &TempDir) -> LoadedArchive {
    let week = dir.path().join("week_02");
    write_market(&week, "GAME1-A", &[30, 40, 45, 37, 29, 33]);
    write_market(&week, "GAME1-B", &[70, 60, 55, 63, 71, 67]);
    write_market(&week, "GAME2-A", &[50, 55, 60, 62, 61, 52, 50]);
    write_market(&week, "GAME2-B", &[50, 45, 40, 38, 39, 48, 50]);
    load_archive(dir.path()).unwrap()
}

fn alpha_grid(start: f64, stop: f64, step: f64) -> SweepGrid {
    SweepGrid {
        min_start: ParamRange::single(0.14),
        max_start: ParamRange::single(0.77),
        gain_threshold: ParamRange::single(0.03),
        fall_fraction: ParamRange::single(0.81),
        ema_alpha: ParamRange::new(start, stop, step),
        halftime_fraction: 1.0,
    }
}

#[test]
fn scores_every_combination() {
    let dir = TempDir::new().unwrap();
    let archive = fixture_archive(&dir);
    let settings = BacktestSettings::default();
    let grid = alpha_grid(0.2, 0.6, 0.1);

    let report = run_sweep(&archive, &settings, &grid, 2, None).unwrap();
    assert_eq!(report.results.len(), 4);
    assert!(report.failures.is_empty());
    assert_eq!(report.workers, 2);

    for result in &report.results {
        let expected = score(&archive, &result.params, &settings).unwrap();
        assert_eq!(result.bankroll, expected);
    }

    let best = report.best().unwrap();
    let max = report
        .results
        .iter()
        .map(|r| r.bankroll)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(best.bankroll, max);
}

#[test]
fn result_set_does_not_depend_on_worker_count() {
    let dir = TempDir::new().unwrap();
    let archive = fixture_archive(&dir);
    let settings = BacktestSettings::default();
    let grid = alpha_grid(0.1, 0.9, 0.1);

    let sorted = |workers| {
        let report = run_sweep(&archive, &settings, &grid, workers, None).unwrap();
        let mut rows: Vec<(f64, f64)> = report
            .results
            .iter()
            .map(|r| (r.params.ema_alpha, r.bankroll))
            .collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        rows
    };
    assert_eq!(sorted(1), sorted(3));
}

#[test]
fn progress_reaches_total() {
    let dir = TempDir::new().unwrap();
    let archive = fixture_archive(&dir);
    let grid = alpha_grid(0.2, 0.6, 0.1);

    let calls = Cell::new(0usize);
    let last = RefCell::new(None);
    let cb = |p: &swinglab_runner::sweep::SweepProgress| {
        calls.set(calls.get() + 1);
        *last.borrow_mut() = Some(p.clone());
    };
    run_sweep(&archive, &BacktestSettings::default(), &grid, 2, Some(&cb)).unwrap();

    assert_eq!(calls.get(), 2);
    let last = last.into_inner().unwrap();
    assert_eq!(last.completed, 4);
    assert_eq!(last.total, 4);
    assert_eq!(last.percent(), 100.0);
    assert!(last.best.is_some());
}

#[test]
fn invalid_combination_is_isolated() {
    let dir = TempDir::new().unwrap();
    let archive = fixture_archive(&dir);
    // 0.9 is valid, 1.1 is not.
    let grid = alpha_grid(0.9, 1.3, 0.2);

    let report = run_sweep(&archive, &BacktestSettings::default(), &grid, 2, None).unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].params.ema_alpha, 1.1);
    assert!(report.failures[0].reason.contains("alpha"));
}

#[test]
fn zero_entry_floor_is_a_failure_not_a_best() {
    let dir = TempDir::new().unwrap();
    let week = dir.path().join("week_03");
    // Smoothed price 0.0 at entry would divide by zero under ratio settlement.
    write_market(&week, "ZERO-A", &[0, 0, 10]);
    write_market(&week, "ZERO-B", &[100, 100, 90]);
    let archive = load_archive(dir.path()).unwrap();

    let grid = SweepGrid {
        min_start: ParamRange::new(0.0, 0.2, 0.1),
        ..alpha_grid(1.0, 1.1, 0.1)
    };
    let report = run_sweep(&archive, &BacktestSettings::default(), &grid, 1, None).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].params.min_start, 0.0);
    assert_eq!(report.results.len(), 1);
    let best = report.best().unwrap();
    assert_eq!(best.params.min_start, 0.1);
    assert!(best.bankroll.is_finite());
}

#[test]
fn fully_inverted_grid_is_empty() {
    let dir = TempDir::new().unwrap();
    let archive = fixture_archive(&dir);
    let grid = SweepGrid {
        min_start: ParamRange::new(0.5, 0.6, 0.1),
        max_start: ParamRange::new(0.3, 0.5, 0.1),
        ..alpha_grid(0.2, 0.3, 0.1)
    };
    let err = run_sweep(&archive, &BacktestSettings::default(), &grid, 2, None).unwrap_err();
    assert!(matches!(err, SweepError::EmptyGrid));
}

#[test]
fn bad_range_is_rejected_before_running() {
    let dir = TempDir::new().unwrap();
    let archive = fixture_archive(&dir);
    let grid = alpha_grid(0.2, 0.6, 0.0);
    let err = run_sweep(&archive, &BacktestSettings::default(), &grid, 2, None).unwrap_err();
    assert!(matches!(err, SweepError::Grid(_)));
}

#[test]
fn results_table_written_to_disk() {
    let dir = TempDir::new().unwrap();
    let archive = fixture_archive(&dir);
    let grid = alpha_grid(0.2, 0.4, 0.1);
    let report = run_sweep(&archive, &BacktestSettings::default(), &grid, 1, None).unwrap();

    let path = dir.path().join("sweeps/sweep_ema_results.csv");
    write_file(&path, &export_sweep_csv(&report.results).unwrap()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "MIN_START,MAX_START,GAIN_THRESHOLD,FALL_FRACTION,ALPHA,FINAL_BANKROLL"
    );
    let first: Vec<&str> = lines.next().unwrap().split(',').collect();
    assert_eq!(&first[..5], &["0.14", "0.77", "0.03", "0.81", "0.2"]);
    assert_eq!(lines.count(), 1);
}
