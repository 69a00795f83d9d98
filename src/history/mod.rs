// =============================================================================
// Historical series acquisition
// =============================================================================
//
// The upstream caps how many candles a single request may return, so an
// arbitrary range is split into bounded windows, fetched in order, merged and
// checked for completeness.

pub mod assembler;
pub mod window;

use std::future::Future;

use crate::types::Candle;

pub use assembler::{AssembledHistory, HistoryRequest, RetryPolicy, SeriesAssembler};
pub use window::Window;

/// Capability to fetch one bounded window of candles from the upstream.
///
/// Implementations make no ordering promise: the returned candles may arrive
/// in any order and may include the window's boundary timestamps.
pub trait WindowFetcher {
    fn fetch_window(
        &self,
        pair: &str,
        window: Window,
        granularity_secs: i64,
    ) -> impl Future<Output = anyhow::Result<Vec<Candle>>> + Send;
}
