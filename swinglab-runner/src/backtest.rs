//! Batch backtester: replays every paired game in a loaded archive.
//!
//! Each side of each game is replayed independently (ratio settlement, flat
//! stake). A game's profit is the sum of its two sides; the bankroll is the
//! starting value plus the sum over all games. Games share no state, so the
//! per-game work runs on the rayon pool and is folded in archive order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use swinglab_core::domain::{ParamError, StrategyParams};
use swinglab_core::strategy::{replay_series, ExitReason, ReplayOutcome};

use crate::config::BacktestSettings;
use crate::data_loader::{Game, LoadedArchive};

/// One opened position in the trade tape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub week: String,
    pub game: String,
    pub market: String,
    pub entry_index: usize,
    pub exit_index: usize,
    pub start_price: f64,
    pub sell_price: f64,
    pub max_gain: f64,
    pub reason: ExitReason,
    pub profit: f64,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub params: StrategyParams,
    pub starting_bankroll: f64,
    pub bankroll: f64,
    pub games_simulated: usize,
    pub positions_opened: usize,
    pub winners: usize,
    pub losers: usize,
    pub trades: Vec<TradeRecord>,
}

impl BacktestResult {
    pub fn net_profit(&self) -> f64 {
        self.bankroll - self.starting_bankroll
    }
}

/// Replay both sides of one game.
pub fn simulate_game(game: &Game, params: &StrategyParams, stake: f64) -> [ReplayOutcome; 2] {
    let [a, b] = &game.sides;
    [
        replay_series(&a.series, params, stake),
        replay_series(&b.series, params, stake),
    ]
}

/// Combined profit of both sides of one game.
fn game_profit(outcomes: &[ReplayOutcome; 2]) -> f64 {
    outcomes.iter().map(ReplayOutcome::profit).sum()
}

/// Fold per-game profits into the bankroll in archive order.
fn accumulate(starting: f64, profits: impl IntoIterator<Item = f64>) -> f64 {
    profits.into_iter().fold(starting, |bankroll, profit| bankroll + profit)
}

/// Run a full backtest and keep the trade tape.
pub fn run_backtest(
    archive: &LoadedArchive,
    params: &StrategyParams,
    settings: &BacktestSettings,
) -> Result<BacktestResult, ParamError> {
    params.validate()?;

    let per_game: Vec<(f64, Vec<TradeRecord>)> = archive
        .weeks
        .par_iter()
        .flat_map_iter(|week| week.games.iter().map(move |game| (week, game)))
        .map(|(week, game)| {
            let outcomes = simulate_game(game, params, settings.stake);
            let profit = game_profit(&outcomes);
            let trades = game
                .sides
                .iter()
                .zip(outcomes)
                .filter_map(|(side, outcome)| {
                    outcome.trade.map(|t| TradeRecord {
                        week: week.name.clone(),
                        game: game.key.clone(),
                        market: side.name.clone(),
                        entry_index: t.entry_index,
                        exit_index: t.exit_index,
                        start_price: t.start_price,
                        sell_price: t.sell_price,
                        max_gain: t.max_gain,
                        reason: t.reason,
                        profit: t.profit,
                    })
                })
                .collect();
            (profit, trades)
        })
        .collect();

    let bankroll = accumulate(
        settings.starting_bankroll,
        per_game.iter().map(|(profit, _)| *profit),
    );
    let trades: Vec<TradeRecord> = per_game
        .into_iter()
        .flat_map(|(_, game_trades)| game_trades)
        .collect();

    let winners = trades.iter().filter(|t| t.profit > 0.0).count();
    let losers = trades.iter().filter(|t| t.profit < 0.0).count();
    debug!(
        bankroll,
        trades = trades.len(),
        "backtest complete for {:?}",
        params
    );

    Ok(BacktestResult {
        params: *params,
        starting_bankroll: settings.starting_bankroll,
        bankroll,
        games_simulated: archive.game_count(),
        positions_opened: trades.len(),
        winners,
        losers,
        trades,
    })
}

/// Final bankroll only. Sequential; the sweep parallelises across grid points.
pub fn score(
    archive: &LoadedArchive,
    params: &StrategyParams,
    settings: &BacktestSettings,
) -> Result<f64, ParamError> {
    params.validate()?;
    let profits = archive
        .games()
        .map(|(_, game)| game_profit(&simulate_game(game, params, settings.stake)));
    Ok(accumulate(settings.starting_bankroll, profits))
}
