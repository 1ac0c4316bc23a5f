//! Consolidated live status view.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRow {
    pub ticker: String,
    /// Current smoothed price.
    pub current: Option<f64>,
    pub samples: usize,
    /// Peak gain of the open position.
    pub max_gain: Option<f64>,
    /// Open stake.
    pub stake: Option<f64>,
    pub unrealized: Option<f64>,
    pub realized: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub rows: Vec<StatusRow>,
    /// Sum of realized profit across closed positions.
    pub bankroll: f64,
}

impl StatusSnapshot {
    pub fn open_count(&self) -> usize {
        self.rows.iter().filter(|r| r.stake.is_some()).count()
    }
}

fn cell(value: Option<f64>, f: impl Fn(f64) -> String) -> String {
    value.map_or_else(|| "-".to_string(), f)
}

fn dollars(v: f64) -> String {
    if v < 0.0 {
        format!("-${:.2}", -v)
    } else {
        format!("${v:.2}")
    }
}

/// Write the status table followed by the bankroll line.
pub fn render<W: Write>(snapshot: &StatusSnapshot, out: &mut W) -> io::Result<()> {
    let width = snapshot
        .rows
        .iter()
        .map(|r| r.ticker.len())
        .max()
        .unwrap_or(0)
        .max("Ticker".len());

    writeln!(
        out,
        "{:<width$}  {:>8}  {:>7}  {:>8}  {:>8}  {:>14}  {:>12}",
        "Ticker", "Current", "Samples", "Max Gain", "Position", "Unrealized P/L", "Realized P/L",
    )?;
    writeln!(out, "{}", "-".repeat(width + 79))?;

    for row in &snapshot.rows {
        writeln!(
            out,
            "{:<width$}  {:>8}  {:>7}  {:>8}  {:>8}  {:>14}  {:>12}",
            row.ticker,
            cell(row.current, |v| format!("{v:.3}")),
            row.samples,
            cell(row.max_gain, |v| format!("{v:.3}")),
            cell(row.stake, dollars),
            cell(row.unrealized, dollars),
            cell(row.realized, dollars),
        )?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "Open positions: {}  |  Total bankroll (realized only): {}",
        snapshot.open_count(),
        dollars(snapshot.bankroll)
    )
}
