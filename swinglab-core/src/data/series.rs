//! Archived series documents.
//!
//! A document is a JSON array of `{"time": <ISO-8601>, "price_cents": <0..=100 | null>}`.
//! Both keys are required on every record; `price_cents: null` is a gap.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::data::ParseError;
use crate::domain::{cents_to_unit, PricePoint, PriceSeries};

/// Parse one archived series document.
pub fn parse_series(json: &str) -> Result<PriceSeries, ParseError> {
    let doc: Value = serde_json::from_str(json)?;
    let Value::Array(records) = doc else {
        return Err(ParseError::NotAnArray);
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            parse_record(record).map_err(|reason| ParseError::MalformedRecord { index, reason })
        })
        .collect()
}

fn parse_record(record: &Value) -> Result<PricePoint, String> {
    let obj = record.as_object().ok_or("record is not an object")?;

    let time = obj
        .get("time")
        .and_then(Value::as_str)
        .ok_or("missing or non-string `time`")?;
    let timestamp = parse_timestamp(time).ok_or_else(|| format!("unparseable time '{time}'"))?;

    let price = match obj.get("price_cents") {
        None => return Err("missing `price_cents`".into()),
        Some(Value::Null) => None,
        Some(v) => Some(cents_to_unit(parse_cents(v)?)),
    };

    Ok(PricePoint::new(timestamp, price))
}

/// Accepts integer cents in `0..=100`.
pub(crate) fn parse_cents(value: &Value) -> Result<i64, String> {
    let cents = value
        .as_i64()
        .ok_or_else(|| format!("price is not an integer: {value}"))?;
    if !(0..=100).contains(&cents) {
        return Err(format!("price {cents} outside 0..=100 cents"));
    }
    Ok(cents)
}

/// RFC 3339 with offset, or a naive ISO-8601 datetime taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
