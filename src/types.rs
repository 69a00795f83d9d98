// =============================================================================
// Shared types used across the history pipeline and indicator engine
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, Result};

/// One OHLCV bucket as returned by the candles endpoint.
///
/// `time` is the bucket start in UNIX epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub low: f64,
    pub high: f64,
    pub open: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(time: i64, low: f64, high: f64, open: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            low,
            high,
            open,
            close,
            volume,
        }
    }

    /// Bucket start as a UTC timestamp, `None` when out of chrono's range.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }

    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
        }
    }
}

/// A single value paired with a point in time. All indicator input and
/// output uses this shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self { time, value }
    }
}

/// Which candle price feeds an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl Default for PriceField {
    fn default() -> Self {
        Self::Close
    }
}

impl std::fmt::Display for PriceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// Reduce an ordered candle series to `(time, price)` points.
pub fn to_series(candles: &[Candle], field: PriceField) -> Result<Vec<TimeSeriesPoint>> {
    candles
        .iter()
        .map(|c| {
            let time = c.datetime().ok_or_else(|| {
                HistoryError::InvalidParameter(format!("candle time {} out of range", c.time))
            })?;
            Ok(TimeSeriesPoint::new(time, c.price(field)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_series_selects_field_and_keeps_order() {
        let candles = vec![
            Candle::new(60, 1.0, 4.0, 2.0, 3.0, 10.0),
            Candle::new(120, 2.0, 5.0, 3.0, 4.0, 11.0),
        ];

        let closes = to_series(&candles, PriceField::Close).unwrap();
        assert_eq!(closes.len(), 2);
        assert_eq!(closes[0].time.timestamp(), 60);
        assert_eq!(closes[1].value, 4.0);

        let highs = to_series(&candles, PriceField::High).unwrap();
        assert_eq!(highs[0].value, 4.0);
        assert_eq!(highs[1].value, 5.0);
    }

    #[test]
    fn to_series_rejects_out_of_range_time() {
        let candles = vec![Candle::new(i64::MAX, 0.0, 0.0, 0.0, 0.0, 0.0)];
        let err = to_series(&candles, PriceField::Close).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidParameter(_)));
    }

    #[test]
    fn price_field_defaults_to_close() {
        assert_eq!(PriceField::default(), PriceField::Close);
        assert_eq!(PriceField::High.to_string(), "high");
    }
}
