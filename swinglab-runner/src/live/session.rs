//! Live session: every tracked market, its smoothing state and position, and
//! the realized bankroll, owned by one value that the tick loop drives.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use swinglab_core::domain::{Exit, Position, Settlement, StrategyParams};
use swinglab_core::smoothing::EmaSmoother;
use swinglab_core::strategy::{EntryBand, ExitPolicy, ExitReason};

use super::feed::FeedTail;
use super::status::{StatusRow, StatusSnapshot};
use super::LiveError;

/// Raw prices kept per market for the status view.
pub const HISTORY_LENGTH: usize = 300;

/// Extension of live feed files.
const FEED_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone)]
pub struct MarketState {
    tail: FeedTail,
    smoother: EmaSmoother,
    last_raw: Option<f64>,
    last_sample_at: Instant,
    history: VecDeque<f64>,
    position: Option<Position>,
}

impl MarketState {
    fn new(path: PathBuf, alpha: f64, now: Instant) -> Self {
        Self {
            tail: FeedTail::new(path),
            smoother: EmaSmoother::new(alpha),
            last_raw: None,
            last_sample_at: now,
            history: VecDeque::with_capacity(HISTORY_LENGTH),
            position: None,
        }
    }

    pub fn smoothed(&self) -> Option<f64> {
        self.smoother.last()
    }

    pub fn last_raw(&self) -> Option<f64> {
        self.last_raw
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn samples(&self) -> usize {
        self.history.len()
    }

    /// Poll the feed and fold in a new sample. Returns whether one arrived.
    fn refresh(&mut self, ticker: &str, now: Instant) -> bool {
        let sample = match self.tail.poll() {
            Ok(Some(sample)) => sample,
            Ok(None) => return false,
            Err(e) => {
                debug!(ticker, "feed unreadable this tick: {e}");
                return false;
            }
        };
        self.smoother.update(sample.price);
        self.last_raw = Some(sample.price);
        self.last_sample_at = now;
        if self.history.len() == HISTORY_LENGTH {
            self.history.pop_front();
        }
        self.history.push_back(sample.price);
        true
    }
}

/// One position closed during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitEvent {
    pub ticker: String,
    pub exit: Exit,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Markets that produced a new sample.
    pub updated: usize,
    /// Markets discovered during this tick.
    pub discovered: usize,
    /// Markets dropped because their feed file disappeared.
    pub removed: usize,
    pub exits: Vec<ExitEvent>,
}

/// All mutable live state. Positions open only in [`LiveSession::start`].
#[derive(Debug, Clone)]
pub struct LiveSession {
    dir: PathBuf,
    alpha: f64,
    band: EntryBand,
    policy: ExitPolicy,
    stale_after: Option<Duration>,
    markets: BTreeMap<String, MarketState>,
    bankroll: f64,
    ticks: u64,
}

impl LiveSession {
    /// Discover every feed in `dir`, seed each smoother with its latest price,
    /// and open a position wherever that price lies in the entry band.
    pub fn start(
        dir: &Path,
        params: &StrategyParams,
        stake: f64,
        stale_after: Option<Duration>,
        now: Instant,
    ) -> Result<Self, LiveError> {
        params.validate()?;
        if !dir.is_dir() {
            return Err(LiveError::MissingDirectory(dir.to_path_buf()));
        }

        let mut session = Self {
            dir: dir.to_path_buf(),
            alpha: params.ema_alpha,
            band: params.entry_band(),
            policy: params.exit_policy(),
            stale_after,
            markets: BTreeMap::new(),
            bankroll: 0.0,
            ticks: 0,
        };
        session.discover(now)?;

        for (ticker, market) in session.markets.iter_mut() {
            market.refresh(ticker, now);
            let Some(price) = market.smoothed() else {
                continue;
            };
            if session.band.admits(price) {
                info!(ticker = %ticker, start_price = price, stake, "opened position");
                market.position = Some(Position::open(stake, price, Settlement::Linear));
            }
        }

        info!(
            markets = session.markets.len(),
            open = session.open_positions(),
            alpha = session.alpha,
            "live session started in {}",
            dir.display()
        );
        Ok(session)
    }

    /// One scheduling tick: poll, smooth, evaluate exits, apply staleness.
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, LiveError> {
        self.ticks += 1;
        let mut report = TickReport {
            discovered: self.discover(now)?,
            removed: self.prune(),
            ..Default::default()
        };

        for (ticker, market) in self.markets.iter_mut() {
            if market.refresh(ticker, now) {
                report.updated += 1;
            }

            let (Some(smoothed), Some(raw)) = (market.smoothed(), market.last_raw) else {
                continue;
            };
            let Some(position) = market.position.as_mut() else {
                continue;
            };

            let mut exit = position.on_tick(smoothed, raw, None, &self.policy);
            if exit.is_none() && position.is_open() {
                let idle = now.saturating_duration_since(market.last_sample_at);
                if self.stale_after.is_some_and(|limit| idle >= limit) {
                    warn!(ticker = %ticker, idle_secs = idle.as_secs(), "closing stale position");
                    exit = position.close(raw, ExitReason::Stale);
                }
            }

            if let Some(exit) = exit {
                self.bankroll += exit.profit;
                info!(
                    ticker = %ticker,
                    reason = %exit.reason,
                    sell_price = exit.sell_price,
                    profit = exit.profit,
                    bankroll = self.bankroll,
                    "closed position"
                );
                report.exits.push(ExitEvent {
                    ticker: ticker.clone(),
                    exit,
                });
            }
        }

        Ok(report)
    }

    /// Track feeds that appeared since the last scan. They are never opened.
    fn discover(&mut self, now: Instant) -> Result<usize, LiveError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| LiveError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut found = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FEED_EXTENSION) {
                continue;
            }
            let Some(ticker) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !self.markets.contains_key(ticker) {
                debug!(ticker, "tracking new market");
                self.markets
                    .insert(ticker.to_string(), MarketState::new(path.clone(), self.alpha, now));
                found += 1;
            }
        }
        Ok(found)
    }

    /// Forget markets whose feed file is gone. An open position keeps its
    /// market so it can still close on staleness.
    fn prune(&mut self) -> usize {
        let before = self.markets.len();
        self.markets.retain(|ticker, market| {
            let keep = market.tail.path().exists()
                || market.position.as_ref().is_some_and(Position::is_open);
            if !keep {
                debug!(ticker = %ticker, "feed removed, no longer tracking");
            }
            keep
        });
        before - self.markets.len()
    }

    pub fn bankroll(&self) -> f64 {
        self.bankroll
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn market(&self, ticker: &str) -> Option<&MarketState> {
        self.markets.get(ticker)
    }

    pub fn markets(&self) -> impl Iterator<Item = (&str, &MarketState)> {
        self.markets.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn open_positions(&self) -> usize {
        self.markets
            .values()
            .filter(|m| m.position.as_ref().is_some_and(Position::is_open))
            .count()
    }

    /// Status rows in ticker order plus the realized bankroll.
    pub fn snapshot(&self) -> StatusSnapshot {
        let rows = self
            .markets
            .iter()
            .map(|(ticker, market)| {
                let open = market.position.as_ref().filter(|p| p.is_open());
                StatusRow {
                    ticker: ticker.clone(),
                    current: market.smoothed(),
                    samples: market.samples(),
                    max_gain: open.map(Position::max_gain),
                    stake: open.map(Position::stake),
                    unrealized: open
                        .zip(market.last_raw)
                        .map(|(p, raw)| p.unrealized_profit(raw)),
                    realized: market.position.as_ref().and_then(Position::realized_profit),
                }
            })
            .collect();
        StatusSnapshot {
            rows,
            bankroll: self.bankroll,
        }
    }
}
