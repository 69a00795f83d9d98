// =============================================================================
// Runtime Configuration — history, indicator and export settings
// =============================================================================
//
// Every tunable of the pipeline lives here: which product to fetch, at which
// granularity and how far back, how politely to page through the upstream,
// how long to keep retrying a short history, the MACD periods and where to
// write the results.
//
// Persistence uses an atomic tmp + rename pattern.  All fields carry
// `#[serde(default)]` so that adding new fields never breaks loading an older
// config file.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::gdax::client::DEFAULT_BASE_URL;
use crate::gdax::live::DEFAULT_WS_URL;
use crate::history::RetryPolicy;
use crate::indicators::MacdParams;
use crate::types::PriceField;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_product_id() -> String {
    "ETH-USD".to_string()
}

fn default_granularity_secs() -> i64 {
    24 * 60 * 60
}

fn default_days_back() -> i64 {
    150
}

fn default_max_per_request() -> usize {
    200
}

fn default_inter_request_delay_ms() -> u64 {
    500
}

fn default_candles_csv() -> Option<String> {
    Some("./candles.csv".to_string())
}

fn default_macd_csv() -> Option<String> {
    Some("./macd.csv".to_string())
}

fn default_api_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}

fn default_live_products() -> Vec<String> {
    vec!["ETH-USD".to_string(), "BTC-USD".to_string()]
}

fn default_live_duration_secs() -> u64 {
    10
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- History ------------------------------------------------------------

    /// Currency pair, e.g. "ETH-USD".
    #[serde(default = "default_product_id")]
    pub product_id: String,

    /// Seconds covered by one candle.
    #[serde(default = "default_granularity_secs")]
    pub granularity_secs: i64,

    /// How far back from now the history starts.
    #[serde(default = "default_days_back")]
    pub days_back: i64,

    /// Upstream cap on candles per request.
    #[serde(default = "default_max_per_request")]
    pub max_per_request: usize,

    /// Pause between consecutive window requests.
    #[serde(default = "default_inter_request_delay_ms")]
    pub inter_request_delay_ms: u64,

    /// Bound on the retry-until-complete loop.
    #[serde(default)]
    pub retry: RetryPolicy,

    // --- Indicators ---------------------------------------------------------

    #[serde(default)]
    pub macd: MacdParams,

    /// Candle price the indicators are computed from.
    #[serde(default)]
    pub price_field: PriceField,

    // --- Export -------------------------------------------------------------

    /// Candle CSV path; `null` disables the export.
    #[serde(default = "default_candles_csv")]
    pub candles_csv: Option<String>,

    /// MACD CSV path; `null` disables the export.
    #[serde(default = "default_macd_csv")]
    pub macd_csv: Option<String>,

    // --- Endpoints & live feed ----------------------------------------------

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Run the live match feed after the historic pipeline.
    #[serde(default)]
    pub enable_live: bool,

    #[serde(default = "default_live_products")]
    pub live_products: Vec<String>,

    /// How long the live feed runs before it is told to quit.
    #[serde(default = "default_live_duration_secs")]
    pub live_duration_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            product_id: default_product_id(),
            granularity_secs: default_granularity_secs(),
            days_back: default_days_back(),
            max_per_request: default_max_per_request(),
            inter_request_delay_ms: default_inter_request_delay_ms(),
            retry: RetryPolicy::default(),
            macd: MacdParams::default(),
            price_field: PriceField::default(),
            candles_csv: default_candles_csv(),
            macd_csv: default_macd_csv(),
            api_base_url: default_api_base_url(),
            ws_url: default_ws_url(),
            enable_live: false,
            live_products: default_live_products(),
            live_duration_secs: default_live_duration_secs(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            product_id = %config.product_id,
            granularity_secs = config.granularity_secs,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `HISTORY_PRODUCT` / `HISTORY_DAYS_BACK` overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("HISTORY_PRODUCT").ok(),
            std::env::var("HISTORY_DAYS_BACK").ok(),
        );
    }

    fn apply_overrides(&mut self, product: Option<String>, days_back: Option<String>) {
        if let Some(product) = product {
            let product = product.trim().to_uppercase();
            if !product.is_empty() {
                self.product_id = product;
            }
        }
        if let Some(days) = days_back.and_then(|d| d.trim().parse::<i64>().ok()) {
            self.days_back = days;
        }
    }

    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    pub fn live_duration(&self) -> Duration {
        Duration::from_secs(self.live_duration_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.product_id, "ETH-USD");
        assert_eq!(cfg.granularity_secs, 86_400);
        assert_eq!(cfg.days_back, 150);
        assert_eq!(cfg.max_per_request, 200);
        assert_eq!(cfg.inter_request_delay(), Duration::from_millis(500));
        assert_eq!(cfg.retry.max_attempts, 10);
        assert_eq!(cfg.macd, MacdParams::new(12, 26, 9));
        assert_eq!(cfg.price_field, PriceField::Close);
        assert!(!cfg.enable_live);
        assert_eq!(cfg.live_products.len(), 2);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.product_id, "ETH-USD");
        assert_eq!(cfg.retry, RetryPolicy::default());
        assert_eq!(cfg.candles_csv.as_deref(), Some("./candles.csv"));
        assert_eq!(cfg.ws_url, DEFAULT_WS_URL);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "product_id": "BTC-USD",
            "price_field": "High",
            "retry": { "max_attempts": 3 },
            "macd_csv": null
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.product_id, "BTC-USD");
        assert_eq!(cfg.price_field, PriceField::High);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.backoff_ms, 3000);
        assert!(cfg.macd_csv.is_none());
        assert_eq!(cfg.granularity_secs, 86_400);
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("gdax-macd-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("history_config.json");

        let mut cfg = RuntimeConfig::default();
        cfg.product_id = "LTC-USD".into();
        cfg.macd = MacdParams::new(5, 35, 5);
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.product_id, "LTC-USD");
        assert_eq!(loaded.macd, MacdParams::new(5, 35, 5));
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_missing_file_is_error() {
        assert!(RuntimeConfig::load("/nonexistent/history_config.json").is_err());
    }

    #[test]
    fn overrides_replace_product_and_days() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(Some(" btc-usd ".into()), Some("30".into()));
        assert_eq!(cfg.product_id, "BTC-USD");
        assert_eq!(cfg.days_back, 30);

        cfg.apply_overrides(Some("".into()), Some("not-a-number".into()));
        assert_eq!(cfg.product_id, "BTC-USD");
        assert_eq!(cfg.days_back, 30);
    }
}
