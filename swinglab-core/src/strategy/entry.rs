use serde::{Deserialize, Serialize};

/// Acceptable range of initial smoothed price for opening a position.
///
/// Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryBand {
    pub min_start: f64,
    pub max_start: f64,
}

impl EntryBand {
    pub fn new(min_start: f64, max_start: f64) -> Self {
        Self {
            min_start,
            max_start,
        }
    }

    pub fn admits(&self, price: f64) -> bool {
        self.min_start <= price && price <= self.max_start
    }

    /// Screen a market on its first defined smoothed value.
    ///
    /// Returns the entry price when the position should be opened.
    pub fn screen<I>(&self, smoothed: I) -> Option<f64>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let entry = smoothed.into_iter().flatten().next()?;
        self.admits(entry).then_some(entry)
    }
}
