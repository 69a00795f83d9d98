// =============================================================================
// Historic pipeline — range -> assembled candles -> price series -> MACD
// =============================================================================

use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::history::{AssembledHistory, HistoryRequest, SeriesAssembler, WindowFetcher};
use crate::indicators::{macd, IndicatorSeries};
use crate::runtime_config::RuntimeConfig;
use crate::types::to_series;

/// Everything one historic run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    pub history: AssembledHistory,
    pub macd: IndicatorSeries,
}

/// Build the history request ending at `end` from `config`.
pub fn history_request(config: &RuntimeConfig, end: DateTime<Utc>) -> Result<HistoryRequest> {
    let start = Duration::try_days(config.days_back)
        .and_then(|back| end.checked_sub_signed(back))
        .with_context(|| format!("days_back {} is out of range", config.days_back))?;

    Ok(HistoryRequest {
        pair: config.product_id.clone(),
        start,
        end,
        granularity_secs: config.granularity_secs,
        max_per_request: config.max_per_request,
    })
}

/// Assemble the configured history through `fetcher` and compute MACD on it.
pub async fn run_historic<F: WindowFetcher>(
    config: &RuntimeConfig,
    fetcher: F,
    end: DateTime<Utc>,
) -> Result<PipelineOutput> {
    let request = history_request(config, end)?;
    let assembler = SeriesAssembler::new(fetcher, config.inter_request_delay(), config.retry);

    let s = Instant::now();
    let history = assembler
        .assemble(&request)
        .await
        .with_context(|| format!("failed to assemble {} history", request.pair))?;
    let e_history = s.elapsed();

    let s = Instant::now();
    let series = to_series(&history.candles, config.price_field)?;
    let e_series = s.elapsed();

    let s = Instant::now();
    let macd = macd(&series, config.macd).context("failed to compute MACD")?;
    let e_macd = s.elapsed();

    if macd.is_empty() {
        warn!(
            candles = history.candles.len(),
            required = config.macd.required_history(),
            "history only covers the MACD warm-up, no output rows"
        );
    }

    info!(
        pair = %request.pair,
        candles = history.candles.len(),
        expected = history.expected,
        attempts = history.attempts,
        window_failures = history.window_failures.len(),
        macd_points = macd.len(),
        history = ?e_history,
        time_series = ?e_series,
        macd_time = ?e_macd,
        "historic pipeline finished"
    );

    Ok(PipelineOutput { history, macd })
}
