//! Reporting and export: sweep results table and backtest trade tape.
//!
//! - **Sweep CSV**: one row per scored configuration, parameters rounded to
//!   3 decimals and bankroll to 2.
//! - **Trades CSV**: one row per opened position in a backtest.
//! - **Summary JSON**: backtest totals without the tape.

use std::path::Path;

use anyhow::{Context, Result};

use crate::backtest::{BacktestResult, TradeRecord};
use crate::sweep::SweepResult;

/// Header of the sweep results table.
pub const SWEEP_HEADER: [&str; 6] = [
    "MIN_START",
    "MAX_START",
    "GAIN_THRESHOLD",
    "FALL_FRACTION",
    "ALPHA",
    "FINAL_BANKROLL",
];

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Export sweep results as CSV, in the order given.
pub fn export_sweep_csv(results: &[SweepResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(SWEEP_HEADER)?;

    for r in results {
        let p = &r.params;
        wtr.write_record([
            round_to(p.min_start, 3).to_string(),
            round_to(p.max_start, 3).to_string(),
            round_to(p.gain_threshold, 3).to_string(),
            round_to(p.fall_fraction, 3).to_string(),
            round_to(p.ema_alpha, 3).to_string(),
            round_to(r.bankroll, 2).to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export a backtest trade tape as CSV.
///
/// Columns: week, game, market, entry_index, exit_index, start_price,
/// sell_price, max_gain, reason, profit
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "week",
        "game",
        "market",
        "entry_index",
        "exit_index",
        "start_price",
        "sell_price",
        "max_gain",
        "reason",
        "profit",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.week,
            &t.game,
            &t.market,
            &t.entry_index.to_string(),
            &t.exit_index.to_string(),
            &format!("{:.4}", t.start_price),
            &format!("{:.4}", t.sell_price),
            &format!("{:.4}", t.max_gain),
            &t.reason.to_string(),
            &format!("{:.4}", t.profit),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Backtest summary (without the trade tape) as pretty JSON.
pub fn export_summary_json(result: &BacktestResult) -> Result<String> {
    let summary = serde_json::json!({
        "params": result.params,
        "starting_bankroll": result.starting_bankroll,
        "bankroll": result.bankroll,
        "net_profit": result.net_profit(),
        "games_simulated": result.games_simulated,
        "positions_opened": result.positions_opened,
        "winners": result.winners,
        "losers": result.losers,
    });
    serde_json::to_string_pretty(&summary).context("failed to serialize backtest summary")
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use swinglab_core::domain::StrategyParams;
    use swinglab_core::strategy::ExitReason;

    #[test]
    fn sweep_rows_are_rounded() {
        let results = [SweepResult {
            params: StrategyParams {
                min_start: 0.14,
                max_start: 0.7200000001,
                gain_threshold: 0.02,
                fall_fraction: 0.79,
                halftime_fraction: 1.0,
                ema_alpha: 0.30000000000000004,
            },
            bankroll: 23.456789,
        }];
        let csv = export_sweep_csv(&results).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "MIN_START,MAX_START,GAIN_THRESHOLD,FALL_FRACTION,ALPHA,FINAL_BANKROLL"
        );
        assert_eq!(lines.next().unwrap(), "0.14,0.72,0.02,0.79,0.3,23.46");
        assert!(lines.next().is_none());
    }

    #[test]
    fn trades_csv_has_one_row_per_trade() {
        let trade = TradeRecord {
            week: "week_01".into(),
            game: "KXNFLGAME-25SEP07ATLTB".into(),
            market: "KXNFLGAME-25SEP07ATLTB-TB".into(),
            entry_index: 0,
            exit_index: 42,
            start_price: 0.3,
            sell_price: 0.33,
            max_gain: 0.1,
            reason: ExitReason::Retracement,
            profit: 0.2,
        };
        let csv = export_trades_csv(&[trade.clone(), trade]).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains(",retracement,"));
    }

    #[test]
    fn write_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweeps/out.csv");
        write_file(&path, "a,b\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a,b\n");
    }
}
