//! SwingLab Runner: archive backtests, parameter sweeps, live tick runner.
//!
//! This crate builds on `swinglab-core` to provide:
//! - Archive loading with per-week game pairing
//! - Batch backtester over a preloaded archive, with a trade tape
//! - Grid sweep on a dedicated worker pool with per-trial failure isolation
//! - CSV/JSON export of sweep results and trades
//! - Live session over append-only feeds, with a status view
//! - TOML configuration for all three contexts

pub mod backtest;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod live;
pub mod sweep;

pub use backtest::{run_backtest, score, simulate_game, BacktestResult, TradeRecord};
pub use config::{AppConfig, BacktestSettings, ConfigError, LiveSettings, SweepSettings};
pub use data_loader::{load_archive, Game, LoadError, LoadedArchive, MarketSeries, WeekBucket};
pub use live::{run_live, LiveError, LiveSession, RenderMode, StatusSnapshot};
pub use sweep::{
    default_workers, run_sweep, ParamRange, SweepError, SweepFailure, SweepGrid, SweepProgress,
    SweepReport, SweepResult,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn archive_is_send_sync() {
        assert_send::<LoadedArchive>();
        assert_sync::<LoadedArchive>();
    }

    #[test]
    fn settings_are_send_sync() {
        assert_send::<BacktestSettings>();
        assert_sync::<BacktestSettings>();
        assert_send::<SweepGrid>();
        assert_sync::<SweepGrid>();
    }

    #[test]
    fn sweep_outputs_are_send_sync() {
        assert_send::<SweepResult>();
        assert_sync::<SweepResult>();
        assert_send::<SweepProgress>();
        assert_sync::<SweepProgress>();
    }

    #[test]
    fn live_session_is_send() {
        assert_send::<LiveSession>();
    }
}
