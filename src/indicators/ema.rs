// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The recursion is seeded with the SMA of the first `period` values.  The seed
// window is consumed: the output starts at input index `period` and has
// `len - period` entries, each carrying the time of its input point.
// =============================================================================

use crate::error::{HistoryError, Result};
use crate::types::TimeSeriesPoint;

/// Arithmetic mean of the values in `points`. `None` for an empty slice.
pub fn sma(points: &[TimeSeriesPoint]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    Some(points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64)
}

/// Compute the EMA of `series` over `period`.
///
/// # Errors
/// - `InvalidParameter` when `period == 0` or the series is not strictly
///   ascending in time.
/// - `InsufficientHistory` when `series.len() < period`.
pub fn ema(series: &[TimeSeriesPoint], period: usize) -> Result<Vec<TimeSeriesPoint>> {
    if period == 0 {
        return Err(HistoryError::InvalidParameter(
            "EMA period must be positive".into(),
        ));
    }
    if series.len() < period {
        return Err(HistoryError::InsufficientHistory {
            required: period,
            available: series.len(),
        });
    }
    ensure_ascending(series)?;

    let (seed, rest) = series.split_at(period);
    let mut prev_ema = sma(seed).unwrap_or_default();
    let multiplier = 2.0 / (period + 1) as f64;

    let mut result = Vec::with_capacity(rest.len());
    for point in rest {
        prev_ema = multiplier * point.value + (1.0 - multiplier) * prev_ema;
        result.push(TimeSeriesPoint::new(point.time, prev_ema));
    }

    Ok(result)
}

fn ensure_ascending(series: &[TimeSeriesPoint]) -> Result<()> {
    if let Some(pair) = series.windows(2).find(|w| w[0].time >= w[1].time) {
        return Err(HistoryError::InvalidParameter(format!(
            "series must be strictly ascending in time ({} is followed by {})",
            pair[0].time, pair[1].time
        )));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    /// Helper: points one minute apart carrying `values`.
    fn series(values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| TimeSeriesPoint::new(at(i as i64 * 60), v))
            .collect()
    }

    #[test]
    fn sma_of_empty_is_none() {
        assert!(sma(&[]).is_none());
        assert_eq!(sma(&series(&[2.0, 4.0, 6.0])), Some(4.0));
    }

    #[test]
    fn ema_period_zero() {
        let err = ema(&series(&[1.0, 2.0]), 0).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidParameter(_)));
    }

    #[test]
    fn ema_insufficient_data() {
        let err = ema(&series(&[1.0, 2.0]), 5).unwrap_err();
        assert!(matches!(
            err,
            HistoryError::InsufficientHistory {
                required: 5,
                available: 2
            }
        ));
    }

    #[test]
    fn ema_period_equals_length_is_empty() {
        let out = ema(&series(&[2.0, 4.0, 6.0]), 3).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn ema_length_law() {
        let input = series(&(1..=40).map(f64::from).collect::<Vec<_>>());
        for period in 1..=40 {
            let out = ema(&input, period).unwrap();
            assert_eq!(out.len(), input.len() - period, "period {period}");
        }
    }

    #[test]
    fn ema_constant_series_is_constant() {
        let input = series(&[7.5; 30]);
        for period in [1, 2, 5, 12, 26, 30] {
            for p in ema(&input, period).unwrap() {
                assert!((p.value - 7.5).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn ema_known_values() {
        // SMA of first 5 = 3.0, multiplier = 2/6 = 1/3
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let input = series(&values);
        let out = ema(&input, 5).unwrap();
        assert_eq!(out.len(), 5);

        let mult = 2.0 / 6.0;
        let mut expected = 3.0;
        for (point, &v) in out.iter().zip(&values[5..]) {
            expected = mult * v + (1.0 - mult) * expected;
            assert!((point.value - expected).abs() < 1e-10);
        }
    }

    #[test]
    fn ema_output_times_follow_seed_window() {
        let input = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let out = ema(&input, 2).unwrap();
        let times: Vec<_> = out.iter().map(|p| p.time).collect();
        let expected: Vec<_> = input[2..].iter().map(|p| p.time).collect();
        assert_eq!(times, expected);
    }

    #[test]
    fn ema_rejects_unordered_series() {
        let mut input = series(&[1.0, 2.0, 3.0, 4.0]);
        input.swap(1, 2);
        let err = ema(&input, 2).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidParameter(_)));

        let dup = vec![
            TimeSeriesPoint::new(at(0), 1.0),
            TimeSeriesPoint::new(at(0), 2.0),
        ];
        assert!(ema(&dup, 1).is_err());
    }
}
