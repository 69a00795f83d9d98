use chrono::{DateTime, Duration, Utc};

use crate::error::{HistoryError, Result};

/// A closed `[start, end]` time range covered by one upstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether `secs` (UNIX epoch seconds) falls inside the window.
    pub fn contains_secs(&self, secs: i64) -> bool {
        self.start.timestamp() <= secs && secs <= self.end.timestamp()
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

fn validate(start: DateTime<Utc>, end: DateTime<Utc>, granularity_secs: i64) -> Result<()> {
    if start >= end {
        return Err(HistoryError::InvalidParameter(format!(
            "range start {start} must be before end {end}"
        )));
    }
    if granularity_secs <= 0 {
        return Err(HistoryError::InvalidParameter(format!(
            "granularity must be positive, got {granularity_secs}s"
        )));
    }
    Ok(())
}

/// `ceil((end - start) / granularity)`: the number of candles a complete
/// history of the range must contain.
pub fn expected_count(start: DateTime<Utc>, end: DateTime<Utc>, granularity_secs: i64) -> Result<usize> {
    validate(start, end, granularity_secs)?;
    let span = (end - start).num_seconds();
    let count = span / granularity_secs + i64::from(span % granularity_secs != 0);
    usize::try_from(count)
        .map_err(|_| HistoryError::InvalidParameter(format!("range too large: {count} candles")))
}

/// Split `[start, end]` into consecutive windows of at most
/// `max_per_request` granularity steps.
///
/// Adjacent windows share their boundary timestamp; the last window is
/// clipped to `end`.  A range that fits in one request yields one window.
pub fn plan_windows(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity_secs: i64,
    max_per_request: usize,
) -> Result<Vec<Window>> {
    if max_per_request == 0 {
        return Err(HistoryError::InvalidParameter(
            "max_per_request must be positive".into(),
        ));
    }
    let expected = expected_count(start, end, granularity_secs)?;
    if expected <= max_per_request {
        return Ok(vec![Window::new(start, end)]);
    }

    let step_secs = i64::try_from(max_per_request)
        .ok()
        .and_then(|n| n.checked_mul(granularity_secs))
        .ok_or_else(|| {
            HistoryError::InvalidParameter(format!(
                "window of {max_per_request} x {granularity_secs}s overflows"
            ))
        })?;
    let step = Duration::seconds(step_secs);

    let mut windows = Vec::with_capacity(expected.div_ceil(max_per_request));
    let mut sframe = start;
    while sframe < end {
        let eframe = (sframe + step).min(end);
        windows.push(Window::new(sframe, eframe));
        sframe = eframe;
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn expected_count_rounds_up() {
        assert_eq!(expected_count(at(0), at(600), 60).unwrap(), 10);
        assert_eq!(expected_count(at(0), at(601), 60).unwrap(), 11);
        assert_eq!(expected_count(at(0), at(1), 86_400).unwrap(), 1);
    }

    #[test]
    fn invalid_ranges_fail_fast() {
        assert!(matches!(
            expected_count(at(100), at(100), 60),
            Err(HistoryError::InvalidParameter(_))
        ));
        assert!(matches!(
            expected_count(at(200), at(100), 60),
            Err(HistoryError::InvalidParameter(_))
        ));
        assert!(matches!(
            expected_count(at(0), at(100), 0),
            Err(HistoryError::InvalidParameter(_))
        ));
        assert!(matches!(
            expected_count(at(0), at(100), -60),
            Err(HistoryError::InvalidParameter(_))
        ));
        assert!(matches!(
            plan_windows(at(0), at(100), 60, 0),
            Err(HistoryError::InvalidParameter(_))
        ));
    }

    #[test]
    fn small_range_is_one_window() {
        let windows = plan_windows(at(0), at(6_000), 60, 100).unwrap();
        assert_eq!(windows, vec![Window::new(at(0), at(6_000))]);
    }

    #[test]
    fn large_range_is_partitioned_and_clipped() {
        // 250 steps with a cap of 100 -> 100 + 100 + 50
        let windows = plan_windows(at(0), at(250 * 60), 60, 100).unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], Window::new(at(0), at(6_000)));
        assert_eq!(windows[1], Window::new(at(6_000), at(12_000)));
        assert_eq!(windows[2], Window::new(at(12_000), at(15_000)));
    }

    #[test]
    fn windows_are_contiguous_and_bounded() {
        let start = at(1_700_000_000);
        let end = at(1_700_000_000 + 86_400 * 7 + 123);
        let windows = plan_windows(start, end, 300, 200).unwrap();

        assert_eq!(windows.first().unwrap().start, start);
        assert_eq!(windows.last().unwrap().end, end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for w in &windows {
            assert!((w.end - w.start).num_seconds() <= 200 * 300);
        }
    }

    #[test]
    fn window_contains_is_inclusive() {
        let w = Window::new(at(60), at(120));
        assert!(w.contains_secs(60));
        assert!(w.contains_secs(120));
        assert!(!w.contains_secs(59));
        assert!(!w.contains_secs(121));
    }
}
