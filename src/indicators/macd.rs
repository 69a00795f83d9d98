// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
// Three EMA passes, each consuming its own seed window:
//
//   fast   = EMA(series, fast)        len = n - fast
//   slow   = EMA(series, slow)        len = n - slow
//   raw[i] = fast[i + (slow - fast)] - slow[i]
//   line   = raw[signal..]            burn-in for the signal seed
//   sig    = EMA(line, signal)        len = n - slow - 2 * signal
//
// Output index i pairs `line[i]` with `sig[i]` and takes its time from
// `sig[i]`.  The histogram is always exactly `macd - signal`.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, Result};
use crate::indicators::ema::ema;
use crate::types::TimeSeriesPoint;

fn default_fast() -> usize {
    12
}

fn default_slow() -> usize {
    26
}

fn default_signal() -> usize {
    9
}

/// Fast / slow / signal periods, in units of the input series spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    #[serde(default = "default_fast")]
    pub fast: usize,
    #[serde(default = "default_slow")]
    pub slow: usize,
    #[serde(default = "default_signal")]
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self::new(default_fast(), default_slow(), default_signal())
    }
}

impl MacdParams {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self { fast, slow, signal }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fast == 0 || self.signal == 0 {
            return Err(HistoryError::InvalidParameter(format!(
                "MACD periods must be positive (fast={}, signal={})",
                self.fast, self.signal
            )));
        }
        if self.fast >= self.slow {
            return Err(HistoryError::InvalidParameter(format!(
                "MACD fast period ({}) must be shorter than slow period ({})",
                self.fast, self.slow
            )));
        }
        Ok(())
    }

    /// Minimum input length that survives all three warm-ups.
    pub fn required_history(&self) -> usize {
        self.slow + 2 * self.signal
    }
}

/// One row of an [`IndicatorSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub time: DateTime<Utc>,
    pub macd: f64,
    pub signal: f64,
    pub hist: f64,
}

/// MACD output as parallel, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub time: Vec<DateTime<Utc>>,
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub hist: Vec<f64>,
}

impl IndicatorSeries {
    fn with_capacity(n: usize) -> Self {
        Self {
            time: Vec::with_capacity(n),
            macd: Vec::with_capacity(n),
            signal: Vec::with_capacity(n),
            hist: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, time: DateTime<Utc>, macd: f64, signal: f64) {
        self.time.push(time);
        self.macd.push(macd);
        self.signal.push(signal);
        self.hist.push(macd - signal);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Row-wise view for sinks that prefer structured points.
    pub fn points(&self) -> impl Iterator<Item = MacdPoint> + '_ {
        (0..self.len()).map(move |i| MacdPoint {
            time: self.time[i],
            macd: self.macd[i],
            signal: self.signal[i],
            hist: self.hist[i],
        })
    }
}

/// Raw MACD line: the fast EMA minus the slow EMA on shared timestamps.
///
/// `ema_fast` starts `slow - fast` entries earlier than `ema_slow`.
fn macd_line(
    ema_fast: &[TimeSeriesPoint],
    ema_slow: &[TimeSeriesPoint],
    offset: usize,
) -> Vec<TimeSeriesPoint> {
    ema_slow
        .iter()
        .zip(&ema_fast[offset..])
        .map(|(slow, fast)| {
            debug_assert_eq!(slow.time, fast.time);
            TimeSeriesPoint::new(slow.time, fast.value - slow.value)
        })
        .collect()
}

/// Compute MACD / signal / histogram over an ascending closing-price series.
///
/// # Errors
/// - `InvalidParameter` when `fast >= slow` or a period is zero.
/// - `InsufficientHistory` when the series is shorter than
///   `slow + 2 * signal`.
pub fn macd(series: &[TimeSeriesPoint], params: MacdParams) -> Result<IndicatorSeries> {
    params.validate()?;

    let required = params.required_history();
    if series.len() < required {
        return Err(HistoryError::InsufficientHistory {
            required,
            available: series.len(),
        });
    }

    let ema_fast = ema(series, params.fast)?;
    let ema_slow = ema(series, params.slow)?;

    let raw = macd_line(&ema_fast, &ema_slow, params.slow - params.fast);
    let line = &raw[params.signal..];
    let signal = ema(line, params.signal)?;

    let mut out = IndicatorSeries::with_capacity(signal.len());
    for (m, s) in line.iter().zip(&signal) {
        out.push(s.time, m.value, s.value);
    }

    Ok(out)
}
