//! Position state machine: NO_POSITION -> OPEN -> CLOSED.
//!
//! A `Position` only exists once entry screening accepted a market, so the
//! NO_POSITION state is the absence of a value. While OPEN, `max_gain` only
//! ever rises. The OPEN -> CLOSED transition happens exactly once; a closed
//! position ignores further ticks.

use serde::{Deserialize, Serialize};

use crate::strategy::{ExitCheck, ExitPolicy, ExitReason};

/// How realized profit is computed from entry and exit prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// Equity-like return: `stake * (sell / start - 1)`. Batch backtests.
    Ratio,
    /// Binary-contract payout: `stake * (sell - start)`. Live runner.
    Linear,
}

impl Settlement {
    pub fn profit(&self, stake: f64, start_price: f64, sell_price: f64) -> f64 {
        match self {
            Settlement::Ratio => stake * (sell_price / start_price - 1.0),
            Settlement::Linear => stake * (sell_price - start_price),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum PositionStatus {
    Open,
    Closed {
        sell_price: f64,
        realized_profit: f64,
        reason: ExitReason,
    },
}

/// Result of the OPEN -> CLOSED transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub reason: ExitReason,
    pub sell_price: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    stake: f64,
    start_price: f64,
    max_gain: f64,
    settlement: Settlement,
    status: PositionStatus,
}

impl Position {
    pub fn open(stake: f64, start_price: f64, settlement: Settlement) -> Self {
        Self {
            stake,
            start_price,
            max_gain: 0.0,
            settlement,
            status: PositionStatus::Open,
        }
    }

    pub fn stake(&self) -> f64 {
        self.stake
    }

    pub fn start_price(&self) -> f64 {
        self.start_price
    }

    pub fn max_gain(&self) -> f64 {
        self.max_gain
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, PositionStatus::Open)
    }

    pub fn realized_profit(&self) -> Option<f64> {
        match self.status {
            PositionStatus::Open => None,
            PositionStatus::Closed {
                realized_profit, ..
            } => Some(realized_profit),
        }
    }

    /// Mark-to-market P/L at `price` under this position's settlement.
    pub fn unrealized_profit(&self, price: f64) -> f64 {
        self.settlement.profit(self.stake, self.start_price, price)
    }

    /// Feed one decision tick: smoothed signal plus the raw price observed
    /// at the same tick. Closes at `raw` when a trigger fires.
    pub fn on_tick(
        &mut self,
        smoothed: f64,
        raw: f64,
        index: Option<usize>,
        policy: &ExitPolicy,
    ) -> Option<Exit> {
        if !self.is_open() {
            return None;
        }

        let gain = smoothed - self.start_price;
        self.max_gain = self.max_gain.max(gain);

        let reason = policy.evaluate(&ExitCheck {
            smoothed,
            start_price: self.start_price,
            gain,
            max_gain: self.max_gain,
            index,
        })?;
        self.close(raw, reason)
    }

    /// Close at `sell_price` regardless of triggers. `None` if already closed.
    pub fn close(&mut self, sell_price: f64, reason: ExitReason) -> Option<Exit> {
        if !self.is_open() {
            return None;
        }
        let profit = self
            .settlement
            .profit(self.stake, self.start_price, sell_price);
        self.status = PositionStatus::Closed {
            sell_price,
            realized_profit: profit,
            reason,
        };
        Some(Exit {
            reason,
            sell_price,
            profit,
        })
    }
}
