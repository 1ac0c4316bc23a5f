//! Entry screening, exit triggers, and batch replay of a single series.

pub mod entry;
pub mod exit;
pub mod replay;

pub use entry::EntryBand;
pub use exit::{ExitCheck, ExitPolicy, ExitReason};
pub use replay::{replay_series, ReplayOutcome, ReplayTrade};
