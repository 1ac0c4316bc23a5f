//! Live append-only feed lines.
//!
//! Each line is an independent JSON object carrying at least `price` (integer
//! cents). The collector stamps lines with `recorded_at`; exchange messages
//! may also carry a unix-seconds `ts`.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::data::series::{parse_cents, parse_timestamp};
use crate::data::ParseError;
use crate::domain::cents_to_unit;

/// One price sample read from a live feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedSample {
    pub price: f64,
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Parse one feed line. `Ok(None)` when the line carries no price.
pub fn parse_feed_line(line: &str) -> Result<Option<FeedSample>, ParseError> {
    let value: Value = serde_json::from_str(line)?;
    let obj = value
        .as_object()
        .ok_or_else(|| ParseError::MalformedRecord {
            index: 0,
            reason: "feed line is not an object".into(),
        })?;

    let price = match obj.get("price") {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => {
            parse_cents(v).map_err(|reason| ParseError::MalformedRecord { index: 0, reason })?
        }
    };

    let recorded_at = obj
        .get("recorded_at")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .or_else(|| {
            obj.get("ts")
                .and_then(Value::as_i64)
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        });

    Ok(Some(FeedSample {
        price: cents_to_unit(price),
        recorded_at,
    }))
}

/// Result of scanning a batch of feed lines.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeedScan {
    /// Last priced sample, if any line carried one.
    pub latest: Option<FeedSample>,
    /// Non-blank lines that failed to parse.
    pub malformed: usize,
}

/// Latest priced sample among `lines`, skipping blank and unparseable lines.
pub fn latest_sample<'a, I>(lines: I) -> FeedScan
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scan = FeedScan::default();
    for line in lines.into_iter().filter(|l| !l.trim().is_empty()) {
        match parse_feed_line(line) {
            Ok(Some(sample)) => scan.latest = Some(sample),
            Ok(None) => {}
            Err(_) => scan.malformed += 1,
        }
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_price_and_recorded_at() {
        let line = r#"{"market_ticker":"KXNFLGAME-25OCT19ATLSF-SF","price":57,"recorded_at":"2025-10-19T20:15:03.123456"}"#;
        let sample = parse_feed_line(line).unwrap().unwrap();
        assert_eq!(sample.price, 0.57);
        assert!(sample.recorded_at.is_some());
    }

    #[test]
    fn falls_back_to_unix_ts() {
        let sample = parse_feed_line(r#"{"price":40,"ts":1760904903}"#)
            .unwrap()
            .unwrap();
        assert_eq!(sample.recorded_at.unwrap().timestamp(), 1_760_904_903);
    }

    #[test]
    fn missing_price_is_not_a_sample() {
        assert_eq!(parse_feed_line(r#"{"yes_bid":40}"#).unwrap(), None);
        assert_eq!(parse_feed_line(r#"{"price":null}"#).unwrap(), None);
    }

    #[test]
    fn non_integer_price_is_malformed() {
        assert!(matches!(
            parse_feed_line(r#"{"price":"57"}"#),
            Err(ParseError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn latest_skips_bad_lines() {
        let lines = [
            r#"{"price":40}"#,
            r#"{"price":41}"#,
            "{truncated",
            "",
            r#"{"volume":3}"#,
        ];
        let scan = latest_sample(lines);
        assert_eq!(scan.latest.unwrap().price, 0.41);
        assert_eq!(scan.malformed, 1);

        let scan = latest_sample(["", "nope"]);
        assert_eq!(scan.latest, None);
        assert_eq!(scan.malformed, 1);
    }
}
