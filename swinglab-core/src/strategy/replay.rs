//! Batch replay of one archived series through entry screening and the
//! position state machine.
//!
//! Gaps stay in place: the smoother skips them, no exit is evaluated on a
//! gap tick, and the end-of-series fallback uses the last defined raw price.

use serde::{Deserialize, Serialize};

use crate::domain::{PriceSeries, Position, Settlement, StrategyParams};
use crate::smoothing::smooth_with_gaps;
use crate::strategy::ExitReason;

/// A position opened and closed during a replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayTrade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub start_price: f64,
    pub sell_price: f64,
    pub max_gain: f64,
    pub reason: ExitReason,
    pub profit: f64,
}

/// Outcome of replaying one side of a game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    /// `None` when entry screening rejected the market.
    pub trade: Option<ReplayTrade>,
}

impl ReplayOutcome {
    pub fn profit(&self) -> f64 {
        self.trade.map_or(0.0, |t| t.profit)
    }
}

/// Replay `series` with a fixed `stake`, settling with the ratio convention.
pub fn replay_series(series: &PriceSeries, params: &StrategyParams, stake: f64) -> ReplayOutcome {
    let raw = series.raw_prices();
    let smoothed = smooth_with_gaps(params.ema_alpha, &raw);

    let Some(entry_index) = smoothed.iter().position(Option::is_some) else {
        return ReplayOutcome::default();
    };
    let Some(start_price) = params.entry_band().screen(smoothed.iter().copied()) else {
        return ReplayOutcome::default();
    };

    let policy = params.exit_policy_for_series(series.len());
    let mut position = Position::open(stake, start_price, Settlement::Ratio);

    let mut closed = None;
    for (idx, (s, r)) in smoothed.iter().zip(&raw).enumerate() {
        let (Some(s), Some(r)) = (*s, *r) else {
            continue;
        };
        if let Some(exit) = position.on_tick(s, r, Some(idx), &policy) {
            closed = Some((idx, exit));
            break;
        }
    }

    let closed = closed.or_else(|| {
        let last_index = raw.iter().rposition(Option::is_some).unwrap_or(entry_index);
        let sell_price = series.last_price().unwrap_or(start_price);
        position
            .close(sell_price, ExitReason::EndOfSeries)
            .map(|exit| (last_index, exit))
    });
    let Some((exit_index, exit)) = closed else {
        return ReplayOutcome::default();
    };

    ReplayOutcome {
        trade: Some(ReplayTrade {
            entry_index,
            exit_index,
            start_price,
            sell_price: exit.sell_price,
            max_gain: position.max_gain(),
            reason: exit.reason,
            profit: exit.profit,
        }),
    }
}
