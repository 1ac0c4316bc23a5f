//! Input formats consumed by the engine: archived series documents and live
//! feed lines.

pub mod feed;
pub mod series;

pub use feed::{latest_sample, parse_feed_line, FeedSample, FeedScan};
pub use series::{parse_series, parse_timestamp};

use thiserror::Error;

/// Errors from parsing an input file or line.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("series document is not a JSON array")]
    NotAnArray,
    #[error("malformed record #{index}: {reason}")]
    MalformedRecord { index: usize, reason: String },
}
