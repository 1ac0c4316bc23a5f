//! Real-time runner over a folder of append-only `<ticker>.jsonl` feeds.
//!
//! Positions are opened once at startup from each market's latest price and
//! then re-evaluated every tick with linear settlement. The status view is
//! redrawn after any exit and otherwise once per refresh interval.

pub mod feed;
pub mod session;
pub mod status;

pub use feed::FeedTail;
pub use session::{ExitEvent, LiveSession, MarketState, TickReport, HISTORY_LENGTH};
pub use status::{render, StatusRow, StatusSnapshot};

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use thiserror::Error;
use tracing::info;

use swinglab_core::domain::ParamError;

use crate::config::LiveSettings;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("active directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },

    #[error("invalid live parameters: {0}")]
    Params(#[from] ParamError),

    #[error("failed to render status: {0}")]
    Render(#[source] io::Error),
}

/// How the status view is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Clear the terminal and redraw from the top-left corner.
    InPlace,
    /// Append each snapshot; for logs and tests.
    Append,
}

/// Run the tick loop until `cancel` is raised or `max_ticks` have run.
///
/// Returns the session so callers can report the final bankroll.
pub fn run_live<W: Write>(
    settings: &LiveSettings,
    out: &mut W,
    mode: RenderMode,
    cancel: Option<&AtomicBool>,
    max_ticks: Option<u64>,
) -> Result<LiveSession, LiveError> {
    let params = settings.strategy_params();
    let mut session = LiveSession::start(
        &settings.active_dir,
        &params,
        settings.stake,
        settings.stale_after(),
        Instant::now(),
    )?;

    draw(&session, out, mode)?;
    let mut last_draw = Instant::now();

    loop {
        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            info!("live session cancelled");
            break;
        }
        if max_ticks.is_some_and(|max| session.ticks() >= max) {
            break;
        }

        let now = Instant::now();
        let report = session.tick(now)?;
        if should_redraw(
            &report,
            now.duration_since(last_draw),
            settings.refresh_interval(),
        ) {
            draw(&session, out, mode)?;
            last_draw = now;
        }

        if max_ticks.is_some_and(|max| session.ticks() >= max) {
            break;
        }
        std::thread::sleep(settings.tick_interval());
    }

    info!(
        ticks = session.ticks(),
        open = session.open_positions(),
        bankroll = session.bankroll(),
        "live session stopped"
    );
    Ok(session)
}

/// Redraw after any exit, otherwise once `since_draw` reaches `interval`.
fn should_redraw(report: &TickReport, since_draw: Duration, interval: Duration) -> bool {
    !report.exits.is_empty() || since_draw >= interval
}

fn draw<W: Write>(session: &LiveSession, out: &mut W, mode: RenderMode) -> Result<(), LiveError> {
    if mode == RenderMode::InPlace {
        execute!(out, Clear(ClearType::All), MoveTo(0, 0)).map_err(LiveError::Render)?;
    }
    render(&session.snapshot(), out).map_err(LiveError::Render)?;
    out.flush().map_err(LiveError::Render)
}
