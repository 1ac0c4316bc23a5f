//! SwingLab CLI: backtest, sweep and live commands.
//!
//! Commands:
//! - `backtest`: replay the weekly archive with one parameter set
//! - `sweep`: grid-search the strategy parameters and write a results table
//! - `live`: track open positions against a folder of live feeds
//!
//! Every command reads an optional TOML config; flags override it.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use swinglab_core::domain::StrategyParams;
use swinglab_runner::export::{
    export_summary_json, export_sweep_csv, export_trades_csv, write_file,
};
use swinglab_runner::{
    default_workers, load_archive, run_backtest, run_live, run_sweep, AppConfig, BacktestResult,
    RenderMode, SweepProgress,
};

#[derive(Parser)]
#[command(
    name = "swinglab",
    about = "SwingLab CLI: smoothed-price swing strategy for binary prediction markets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay every paired game in the archive and report the final bankroll.
    Backtest {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Archive root (one sub-directory per week).
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Smoothing alpha, overriding the config.
        #[arg(long)]
        alpha: Option<f64>,

        /// Write the trade tape as CSV.
        #[arg(long)]
        trades: Option<PathBuf>,

        /// Write the run summary as JSON.
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Grid-search strategy parameters against the archive.
    Sweep {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Archive root (one sub-directory per week).
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Results table destination.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Worker threads. Defaults to available parallelism minus one.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Open positions on in-band live markets and manage exits until Ctrl+C.
    Live {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Folder of `<ticker>.jsonl` feeds.
        #[arg(long)]
        active_dir: Option<PathBuf>,

        /// Stop after this many ticks.
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Smoothing alpha, overriding the sigma-derived value.
        #[arg(long)]
        alpha: Option<f64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            config,
            archive,
            alpha,
            trades,
            summary,
        } => run_backtest_cmd(config.as_deref(), archive, alpha, trades, summary),
        Commands::Sweep {
            config,
            archive,
            output,
            workers,
        } => run_sweep_cmd(config.as_deref(), archive, output, workers),
        Commands::Live {
            config,
            active_dir,
            max_ticks,
            alpha,
        } => run_live_cmd(config.as_deref(), active_dir, max_ticks, alpha),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn run_backtest_cmd(
    config_path: Option<&Path>,
    archive_dir: Option<PathBuf>,
    alpha: Option<f64>,
    trades_path: Option<PathBuf>,
    summary_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = archive_dir {
        config.backtest.archive_dir = dir;
    }
    if let Some(alpha) = alpha {
        config.strategy.ema_alpha = alpha;
    }

    let archive = load_archive(&config.backtest.archive_dir)?;
    let result = run_backtest(&archive, &config.strategy, &config.backtest)?;

    print_summary(&result);

    if let Some(path) = trades_path {
        write_file(&path, &export_trades_csv(&result.trades)?)?;
        println!("Trades saved to: {}", path.display());
    }
    if let Some(path) = summary_path {
        write_file(&path, &export_summary_json(&result)?)?;
        println!("Summary saved to: {}", path.display());
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let p = &result.params;
    println!(
        "Params: min_start={:.2} max_start={:.2} gain_threshold={:.3} fall_fraction={:.2} halftime_fraction={:.2} ema_alpha={:.3}",
        p.min_start, p.max_start, p.gain_threshold, p.fall_fraction, p.halftime_fraction, p.ema_alpha
    );
    println!("Games simulated:   {}", result.games_simulated);
    println!(
        "Positions opened:  {} ({} winners, {} losers)",
        result.positions_opened, result.winners, result.losers
    );
    println!("Starting bankroll: ${:.2}", result.starting_bankroll);
    println!("Final bankroll:    ${:.2}", result.bankroll);
    println!("Net profit:        ${:.2}", result.net_profit());
}

fn run_sweep_cmd(
    config_path: Option<&Path>,
    archive_dir: Option<PathBuf>,
    output: Option<PathBuf>,
    workers: Option<usize>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = archive_dir {
        config.backtest.archive_dir = dir;
    }
    let output = output.unwrap_or_else(|| config.sweep.output.clone());
    let workers = workers
        .or(config.sweep.workers)
        .unwrap_or_else(default_workers);

    let archive = load_archive(&config.backtest.archive_dir)?;
    let progress = |p: &SweepProgress| {
        info!(
            "progress {}/{} ({:.1}%) failed={} best={} elapsed={:.1}s",
            p.completed,
            p.total,
            p.percent(),
            p.failed,
            p.best
                .map_or_else(|| "-".to_string(), |b| format!("{:.2}", b.bankroll)),
            p.elapsed_secs
        );
    };
    let report = run_sweep(
        &archive,
        &config.backtest,
        &config.sweep.grid(),
        workers,
        Some(&progress),
    )?;

    write_file(&output, &export_sweep_csv(&report.results)?)?;
    info!(
        rows = report.results.len(),
        failures = report.failures.len(),
        "results written to {}",
        output.display()
    );

    match report.best() {
        Some(best) => log_best(&best.params, best.bankroll),
        None => info!("no configuration could be scored"),
    }
    Ok(())
}

fn log_best(params: &StrategyParams, bankroll: f64) {
    info!("best configuration:");
    info!("  min_start         = {:.3}", params.min_start);
    info!("  max_start         = {:.3}", params.max_start);
    info!("  gain_threshold    = {:.3}", params.gain_threshold);
    info!("  fall_fraction     = {:.3}", params.fall_fraction);
    info!("  halftime_fraction = {:.3}", params.halftime_fraction);
    info!("  ema_alpha         = {:.3}", params.ema_alpha);
    info!("  final bankroll    = {:.2}", bankroll);
}

fn run_live_cmd(
    config_path: Option<&Path>,
    active_dir: Option<PathBuf>,
    max_ticks: Option<u64>,
    alpha: Option<f64>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = active_dir {
        config.live.active_dir = dir;
    }
    if alpha.is_some() {
        config.live.ema_alpha = alpha;
    }
    info!(alpha = config.live.alpha(), "starting live runner");

    let interrupted = install_interrupt_flag()?;
    let mut stdout = io::stdout();
    let session = run_live(
        &config.live,
        &mut stdout,
        RenderMode::InPlace,
        Some(&*interrupted),
        max_ticks,
    )?;
    println!(
        "Stopped after {} ticks. Realized bankroll: ${:.2}",
        session.ticks(),
        session.bankroll()
    );
    Ok(())
}

/// Raise the returned flag on Ctrl+C so the tick loop can stop between ticks.
fn install_interrupt_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;

    let raised = Arc::clone(&flag);
    std::thread::spawn(move || {
        runtime.block_on(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received Ctrl+C, stopping after the current tick");
                    raised.store(true, Ordering::SeqCst);
                }
                Err(e) => warn!("failed to listen for Ctrl+C: {e}"),
            }
        });
    });
    Ok(flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_flag_starts_lowered() {
        let flag = install_interrupt_flag().unwrap();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn live_flags_parse() {
        let cli = Cli::try_parse_from(["swinglab", "live", "--max-ticks", "5", "--alpha", "0.2"])
            .unwrap();
        match cli.command {
            Commands::Live {
                max_ticks, alpha, ..
            } => {
                assert_eq!(max_ticks, Some(5));
                assert_eq!(alpha, Some(0.2));
            }
            _ => panic!("expected live command"),
        }
    }
}
