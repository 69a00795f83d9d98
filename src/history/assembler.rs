// =============================================================================
// Series Assembler — gap-free, ordered candle history over a bounded API
// =============================================================================
//
// One attempt fetches every planned window sequentially (with a courtesy
// delay between requests), merges the batches, drops off-grid and duplicate
// timestamps and sorts ascending.  If the merged count is short of the
// expected count, or an aligned bucket is missing between the first aligned
// timestamp and the last candle, the whole range is fetched again after a
// backoff, until the retry policy runs out.
//
// The retry loop assumes the upstream is eventually consistent.  It is a
// heuristic, not a completeness proof: a range the upstream never fills ends
// in `IncompleteUpstreamData`.
// =============================================================================

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{HistoryError, Result};
use crate::history::window::{expected_count, plan_windows, Window};
use crate::history::WindowFetcher;
use crate::types::Candle;

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_ms() -> u64 {
    3000
}

/// Bound on the retry-until-complete loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait between a short attempt and the next one.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Optional wall-clock ceiling across all attempts.
    #[serde(default)]
    pub max_elapsed_secs: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            max_elapsed_secs: None,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(HistoryError::InvalidParameter(
                "retry policy needs at least one attempt".into(),
            ));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed_secs.map(Duration::from_secs)
    }
}

/// What to assemble.
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub pair: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity_secs: i64,
    pub max_per_request: usize,
}

/// A window fetch that failed at the transport level.
#[derive(Debug, Clone)]
pub struct WindowFailure {
    pub attempt: u32,
    pub window: Window,
    pub reason: String,
}

/// A complete, ascending, duplicate-free candle history.
#[derive(Debug, Clone)]
pub struct AssembledHistory {
    pub candles: Vec<Candle>,
    pub expected: usize,
    pub attempts: u32,
    /// Transport failures seen on every attempt, including retried ones.
    pub window_failures: Vec<WindowFailure>,
}

/// Drives a [`WindowFetcher`] over a range until the history is complete.
pub struct SeriesAssembler<F> {
    fetcher: F,
    inter_request_delay: Duration,
    retry: RetryPolicy,
}

impl<F: WindowFetcher> SeriesAssembler<F> {
    pub fn new(fetcher: F, inter_request_delay: Duration, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            inter_request_delay,
            retry,
        }
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Assemble `request` into an ordered, gap-free series holding at least
    /// the expected number of candles.
    ///
    /// # Errors
    /// - `InvalidParameter` for an empty range, a non-positive granularity,
    ///   a zero window cap or an unusable retry policy.  Never retried.
    /// - `IncompleteUpstreamData` once the retry policy is exhausted.
    pub async fn assemble(&self, request: &HistoryRequest) -> Result<AssembledHistory> {
        self.retry.validate()?;
        if request.pair.trim().is_empty() {
            return Err(HistoryError::InvalidParameter(
                "currency pair must not be empty".into(),
            ));
        }
        let expected = expected_count(request.start, request.end, request.granularity_secs)?;
        let windows = plan_windows(
            request.start,
            request.end,
            request.granularity_secs,
            request.max_per_request,
        )?;
        let range = Window::new(request.start, request.end);

        info!(
            pair = %request.pair,
            range = %range,
            granularity_secs = request.granularity_secs,
            expected,
            windows = windows.len(),
            "assembling history"
        );

        let started = Instant::now();
        let mut window_failures = Vec::new();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let (candles, failures) = self.fetch_once(request, &windows, range, attempt).await;
            let received = candles.len();
            let gaps = count_gaps(&candles, range, request.granularity_secs);
            let failed_windows = failures.len();
            window_failures.extend(failures);

            info!(attempt, received, expected, gaps, "data returned from API");

            if received >= expected && gaps == 0 {
                return Ok(AssembledHistory {
                    candles,
                    expected,
                    attempts: attempt,
                    window_failures,
                });
            }

            let backoff = self.retry.backoff();
            let out_of_attempts = attempt >= self.retry.max_attempts;
            let out_of_time = self
                .retry
                .max_elapsed()
                .is_some_and(|limit| started.elapsed() + backoff >= limit);

            if out_of_attempts || out_of_time {
                error!(
                    pair = %request.pair,
                    attempt,
                    received,
                    expected,
                    gaps,
                    failed_windows,
                    "history did not converge"
                );
                return Err(HistoryError::IncompleteUpstreamData {
                    expected,
                    received,
                    gaps,
                    attempts: attempt,
                    failed_windows,
                });
            }

            warn!(
                attempt,
                missing = expected.saturating_sub(received),
                gaps,
                backoff_ms = self.retry.backoff_ms,
                "history incomplete, retrying whole range"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// Fetch every window once, in order, and merge the results.
    async fn fetch_once(
        &self,
        request: &HistoryRequest,
        windows: &[Window],
        range: Window,
        attempt: u32,
    ) -> (Vec<Candle>, Vec<WindowFailure>) {
        let mut candles = Vec::new();
        let mut failures = Vec::new();

        for (i, window) in windows.iter().enumerate() {
            if i > 0 && !self.inter_request_delay.is_zero() {
                tokio::time::sleep(self.inter_request_delay).await;
            }

            match self
                .fetcher
                .fetch_window(&request.pair, *window, request.granularity_secs)
                .await
            {
                Ok(batch) => {
                    debug!(window = %window, count = batch.len(), "window fetched");
                    candles.extend(batch);
                }
                Err(e) => {
                    // Counted as zero candles; the completeness check decides
                    // whether to retry.
                    warn!(window = %window, attempt, error = %e, "window fetch failed");
                    failures.push(WindowFailure {
                        attempt,
                        window: *window,
                        reason: format!("{e:#}"),
                    });
                }
            }
        }

        (
            merge_candles(candles, range, request.granularity_secs),
            failures,
        )
    }
}

/// Keep aligned candles inside `range`, sort ascending by time and drop
/// duplicate timestamps, keeping the first occurrence in fetch order.
///
/// Buckets are aligned to multiples of `granularity_secs` since the epoch.
pub fn merge_candles(
    mut candles: Vec<Candle>,
    range: Window,
    granularity_secs: i64,
) -> Vec<Candle> {
    let before = candles.len();
    candles.retain(|c| {
        range.contains_secs(c.time) && c.time.rem_euclid(granularity_secs) == 0
    });
    if candles.len() < before {
        debug!(
            dropped = before - candles.len(),
            "discarded off-range or off-grid candles"
        );
    }
    candles.sort_by_key(|c| c.time);
    candles.dedup_by_key(|c| c.time);
    candles
}

/// Aligned buckets missing from a merged, ascending series: those between
/// the first aligned timestamp of `range` and the first candle, plus every
/// hole between neighbours.  Buckets after the last candle are left to the
/// count check.
pub fn count_gaps(candles: &[Candle], range: Window, granularity_secs: i64) -> usize {
    let Some(first) = candles.first() else {
        return 0;
    };
    let start = range.start.timestamp();
    let first_aligned = start + (-start).rem_euclid(granularity_secs);

    let missing_steps =
        |from: i64, to: i64| ((to - from) / granularity_secs - 1).max(0) as usize;

    let leading = missing_steps(first_aligned - granularity_secs, first.time);
    let interior: usize = candles
        .windows(2)
        .map(|pair| missing_steps(pair[0].time, pair[1].time))
        .sum();
    leading + interior
}
