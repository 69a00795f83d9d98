// =============================================================================
// GDAX / Coinbase Exchange REST client — public historic rates
// =============================================================================
//
// GET /products/{pair}/candles returns at most a few hundred buckets per call,
// in no guaranteed order, as an array of arrays:
//   [ time, low, high, open, close, volume ]
// No authentication is needed for market data.
// =============================================================================

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::history::{Window, WindowFetcher};
use crate::types::Candle;

/// Default public REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.exchange.coinbase.com";

/// Raw wire shape of one bucket.
type RawCandle = (i64, f64, f64, f64, f64, f64);

/// REST client for the public candles endpoint.
#[derive(Clone)]
pub struct GdaxClient {
    base_url: String,
    client: reqwest::Client,
}

impl GdaxClient {
    /// Create a client against `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        debug!(base_url = %base_url, "GdaxClient initialised");

        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn candles_url(&self, pair: &str) -> String {
        format!("{}/products/{}/candles", self.base_url(), pair)
    }

    /// GET /products/{pair}/candles for one window.
    #[instrument(skip(self, window), name = "gdax::get_candles", fields(window = %window))]
    pub async fn get_candles(
        &self,
        pair: &str,
        window: Window,
        granularity_secs: i64,
    ) -> Result<Vec<Candle>> {
        let resp = self
            .client
            .get(self.candles_url(pair))
            .query(&[
                ("start", window.start.to_rfc3339()),
                ("end", window.end.to_rfc3339()),
                ("granularity", granularity_secs.to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("GET /products/{pair}/candles request failed"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("failed to read candles response body")?;

        if !status.is_success() {
            anyhow::bail!("GDAX GET /products/{pair}/candles returned {status}: {body}");
        }

        let candles = parse_candles(&body)?;
        debug!(pair, count = candles.len(), "candles fetched");
        Ok(candles)
    }
}

impl WindowFetcher for GdaxClient {
    async fn fetch_window(
        &self,
        pair: &str,
        window: Window,
        granularity_secs: i64,
    ) -> Result<Vec<Candle>> {
        self.get_candles(pair, window, granularity_secs).await
    }
}

impl std::fmt::Debug for GdaxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GdaxClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Parse the array-of-arrays candles payload.
fn parse_candles(body: &str) -> Result<Vec<Candle>> {
    let raw: Vec<RawCandle> =
        serde_json::from_str(body).context("failed to parse candles response")?;

    Ok(raw
        .into_iter()
        .map(|(time, low, high, open, close, volume)| {
            Candle::new(time, low, high, open, close, volume)
        })
        .collect())
}
