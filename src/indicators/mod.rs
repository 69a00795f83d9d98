// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, synchronous batch computations over already-materialised series.
// Each stage is an independent `series -> series` call so the warm-up
// offsets between them stay explicit.

pub mod ema;
pub mod macd;

pub use macd::{macd, IndicatorSeries, MacdParams};
