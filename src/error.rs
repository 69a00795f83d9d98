// =============================================================================
// Error taxonomy for history assembly and indicator computation
// =============================================================================
//
// Parameter and history-length problems fail fast and are never retried.
// Upstream shortfalls surface only after the retry policy is exhausted.
// Transport failures stay `anyhow::Error` at the fetcher boundary and are
// recorded per window by the assembler.
// =============================================================================

/// Errors produced by the assembler and the indicator engine.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Bad range, bad period ordering, non-positive granularity, etc.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input is shorter than the warm-up the computation needs.
    #[error("insufficient history: need {required} points, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    /// Assembled history stayed short of the expected count or kept holes.
    #[error(
        "incomplete history: received {received}/{expected} candles with {gaps} missing \
         bucket(s) after {attempts} attempt(s) ({failed_windows} window fetch failure(s) \
         on the last attempt)"
    )]
    IncompleteUpstreamData {
        expected: usize,
        received: usize,
        gaps: usize,
        attempts: u32,
        failed_windows: usize,
    },
}

pub type Result<T> = std::result::Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_counts() {
        let err = HistoryError::InsufficientHistory {
            required: 26,
            available: 10,
        };
        assert_eq!(
            err.to_string(),
            "insufficient history: need 26 points, have 10"
        );

        let err = HistoryError::IncompleteUpstreamData {
            expected: 150,
            received: 149,
            gaps: 2,
            attempts: 3,
            failed_windows: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("149/150"));
        assert!(msg.contains("2 missing bucket(s)"));
        assert!(msg.contains("3 attempt(s)"));
    }
}
