//! Archive loading and game pairing.
//!
//! The archive root holds one directory per week. Each week directory holds
//! `<key>-<side>.json` series files. A game is the set of files sharing a key
//! (filename minus its trailing `-<side>`); only keys with exactly two files
//! are simulated. The whole archive is parsed once so that every backtest in
//! a sweep replays in memory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use swinglab_core::data::parse_series;
use swinglab_core::domain::PriceSeries;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("archive directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One side of a game: a named market and its series.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSeries {
    /// File stem, e.g. `KXNFLGAME-25SEP07ATLTB-TB`.
    pub name: String,
    pub series: PriceSeries,
}

/// Both sides of one binary market.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub key: String,
    pub sides: [MarketSeries; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekBucket {
    pub name: String,
    pub games: Vec<Game>,
}

/// Counters for files that did not become games.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadDiagnostics {
    /// Files that failed to read or parse.
    pub skipped_files: usize,
    /// Keys with a file count other than two.
    pub unpaired_keys: usize,
    /// Paired games dropped because a side failed to parse.
    pub dropped_games: usize,
}

/// Parsed archive, ready for repeated in-memory backtests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedArchive {
    pub weeks: Vec<WeekBucket>,
    pub diagnostics: LoadDiagnostics,
}

impl LoadedArchive {
    pub fn game_count(&self) -> usize {
        self.weeks.iter().map(|w| w.games.len()).sum()
    }

    pub fn games(&self) -> impl Iterator<Item = (&WeekBucket, &Game)> {
        self.weeks
            .iter()
            .flat_map(|w| w.games.iter().map(move |g| (w, g)))
    }
}

/// Game key for a series file name: the stem minus its trailing `-<side>`.
///
/// Returns `None` for files that are not `.json`.
pub fn game_key(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(".json")?;
    Some(stem.rsplit_once('-').map_or(stem, |(key, _side)| key))
}

/// Load and pair every week under `root`.
///
/// Fails fast when `root` is missing; malformed files are skipped with a warning.
pub fn load_archive(root: &Path) -> Result<LoadedArchive, LoadError> {
    if !root.is_dir() {
        return Err(LoadError::MissingDirectory(root.to_path_buf()));
    }

    let week_dirs: Vec<PathBuf> = read_dir_sorted(root)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect();

    let mut archive = LoadedArchive::default();
    for dir in week_dirs {
        let week = load_week(&dir, &mut archive.diagnostics)?;
        debug!(week = %week.name, games = week.games.len(), "loaded week");
        archive.weeks.push(week);
    }

    let d = &archive.diagnostics;
    info!(
        weeks = archive.weeks.len(),
        games = archive.game_count(),
        skipped_files = d.skipped_files,
        unpaired_keys = d.unpaired_keys,
        dropped_games = d.dropped_games,
        "archive loaded from {}",
        root.display()
    );
    Ok(archive)
}

fn load_week(dir: &Path, diagnostics: &mut LoadDiagnostics) -> Result<WeekBucket, LoadError> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut by_key: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in read_dir_sorted(dir)? {
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(key) = game_key(file_name) {
            by_key.entry(key.to_string()).or_default().push(path);
        }
    }

    let mut games = Vec::new();
    for (key, files) in by_key {
        let [first, second] = files.as_slice() else {
            debug!(week = %name, key = %key, files = files.len(), "skipping unpaired key");
            diagnostics.unpaired_keys += 1;
            continue;
        };
        match (load_side(first), load_side(second)) {
            (Some(a), Some(b)) => games.push(Game { key, sides: [a, b] }),
            (a, b) => {
                diagnostics.skipped_files += usize::from(a.is_none()) + usize::from(b.is_none());
                diagnostics.dropped_games += 1;
                warn!(week = %name, key = %key, "dropping game with an unreadable side");
            }
        }
    }

    Ok(WeekBucket { name, games })
}

fn load_side(path: &Path) -> Option<MarketSeries> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("skipping {}: {e}", path.display());
            return None;
        }
    };
    match parse_series(&text) {
        Ok(series) => Some(MarketSeries {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            series,
        }),
        Err(e) => {
            warn!("skipping {}: {e}", path.display());
            None
        }
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_strips_trailing_side() {
        assert_eq!(
            game_key("KXNFLGAME-25SEP07ATLTB-TB.json"),
            Some("KXNFLGAME-25SEP07ATLTB")
        );
        assert_eq!(game_key("solo.json"), Some("solo"));
        assert_eq!(game_key("summary.csv"), None);
    }

    #[test]
    fn missing_root_fails_fast() {
        let err = load_archive(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, LoadError::MissingDirectory(_)));
    }
}
