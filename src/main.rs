// =============================================================================
// GDAX MACD — Main Entry Point
// =============================================================================
//
// Fetches the configured product's historic candles, computes MACD over them
// and exports both to CSV.  Optionally tails the live match feed afterwards.
// Any pipeline error ends the process with a non-zero status.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod error;
mod export;
mod gdax;
mod history;
mod indicators;
mod pipeline;
mod runtime_config;
mod types;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::gdax::GdaxClient;
use crate::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "history_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        let config = RuntimeConfig::default();
        if let Err(e) = config.save(CONFIG_PATH) {
            warn!(error = %e, "Failed to write default config");
        }
        config
    });
    config.apply_env_overrides();

    info!(
        product_id = %config.product_id,
        granularity_secs = config.granularity_secs,
        days_back = config.days_back,
        macd = ?config.macd,
        price_field = %config.price_field,
        "Configured history run"
    );

    // ── 2. Historic pipeline ─────────────────────────────────────────────
    let client = GdaxClient::new(config.api_base_url.clone());
    let output = pipeline::run_historic(&config, client, Utc::now()).await?;

    for failure in &output.history.window_failures {
        warn!(
            attempt = failure.attempt,
            window = %failure.window,
            reason = %failure.reason,
            "window fetch failed during assembly"
        );
    }

    // ── 3. Export ────────────────────────────────────────────────────────
    if let Some(path) = &config.candles_csv {
        export::export_candles(path, &output.history.candles)
            .context("failed to export candles")?;
    }
    if let Some(path) = &config.macd_csv {
        export::export_macd(path, &output.macd).context("failed to export MACD")?;
    }

    // ── 4. Live match feed ───────────────────────────────────────────────
    if config.enable_live {
        let (tx, mut rx) = mpsc::channel(1024);
        let (quit_tx, quit_rx) = watch::channel(false);

        let ws_url = config.ws_url.clone();
        let products = config.live_products.clone();
        let feed = tokio::spawn(async move {
            if let Err(e) = gdax::run_match_feed(&ws_url, &products, tx, quit_rx).await {
                error!(error = %e, "Live match feed failed");
            }
        });

        let duration = config.live_duration();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = quit_tx.send(true);
        });

        // Drains until the feed task drops its sender.
        while let Some(m) = rx.recv().await {
            info!(
                product_id = %m.product_id,
                side = %m.side,
                price = m.price,
                size = m.size,
                time = %m.time,
                "match"
            );
        }
        if let Err(e) = feed.await {
            error!(error = %e, "Live match feed task aborted");
        }
    }

    info!("Done.");
    Ok(())
}
