use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed sample of a binary market.
///
/// `price` is the implied win probability in `[0, 1]`; `None` marks a gap in
/// the recorded feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Option<f64>,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: Option<f64>) -> Self {
        Self { timestamp, price }
    }
}

/// Convert integer cents (0–100) to the unit interval.
pub fn cents_to_unit(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Time-ordered samples for one side of one game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Raw prices with gaps kept as `None` placeholders.
    pub fn raw_prices(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.price).collect()
    }

    /// Last defined raw price in the series.
    pub fn last_price(&self) -> Option<f64> {
        self.points.iter().rev().find_map(|p| p.price)
    }
}

impl FromIterator<PricePoint> for PriceSeries {
    fn from_iter<I: IntoIterator<Item = PricePoint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
