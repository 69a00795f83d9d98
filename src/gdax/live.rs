// =============================================================================
// Live match feed — Coinbase Exchange websocket `matches` channel
// =============================================================================
//
// Forwards every executed trade for the subscribed products to a channel.
// This is transport plumbing only: nothing here feeds the indicator engine.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Default public websocket endpoint.
pub const DEFAULT_WS_URL: &str = "wss://ws-feed.exchange.coinbase.com";

/// One executed trade from the `matches` channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WsMatch {
    pub product_id: String,
    pub trade_id: u64,
    pub sequence: u64,
    pub side: String,
    pub size: f64,
    pub price: f64,
    pub time: DateTime<Utc>,
}

/// Subscription request for the `matches` channel.
fn subscribe_message(products: &[String]) -> String {
    serde_json::json!({
        "type": "subscribe",
        "product_ids": products,
        "channels": ["matches"],
    })
    .to_string()
}

/// Connect to `ws_url`, subscribe to `products` and forward matches on
/// `sender` until `quit` becomes `true`, the receiver is dropped or the
/// socket closes.
///
/// Returns an error only for connection or read failures so the caller can
/// decide whether to reconnect.
pub async fn run_match_feed(
    ws_url: &str,
    products: &[String],
    sender: mpsc::Sender<WsMatch>,
    mut quit: watch::Receiver<bool>,
) -> Result<()> {
    if products.is_empty() {
        warn!("no products configured for live feed");
        return Ok(());
    }

    info!(url = %ws_url, products = ?products, "connecting to match feed");
    let (ws_stream, _response) = connect_async(ws_url)
        .await
        .context("failed to connect to match feed")?;

    let (mut write, mut read) = ws_stream.split();
    write
        .send(Message::Text(subscribe_message(products)))
        .await
        .context("failed to send subscribe message")?;
    info!(products = ?products, "match feed subscribed");

    loop {
        tokio::select! {
            changed = quit.changed() => {
                if changed.is_err() || *quit.borrow() {
                    info!("match feed stopped by caller");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => match parse_match(&text) {
                    Ok(Some(m)) => {
                        if sender.send(m).await.is_err() {
                            debug!("match receiver dropped, closing feed");
                            return Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "failed to parse feed message"),
                },
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "match feed read error");
                    return Err(e.into());
                }
                None => {
                    warn!("match feed stream ended");
                    return Ok(());
                }
            },
        }
    }
}

/// Parse one feed message. Non-match messages (`subscriptions`, `heartbeat`,
/// ...) yield `Ok(None)`; feed-level `error` messages are errors.
///
/// Expected shape:
/// ```json
/// { "type": "match", "trade_id": 10, "sequence": 50, "time": "2014-11-07T08:19:27.028459Z",
///   "product_id": "BTC-USD", "size": "5.23512", "price": "400.23", "side": "sell" }
/// ```
fn parse_match(text: &str) -> Result<Option<WsMatch>> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse feed JSON")?;

    match root["type"].as_str() {
        Some("match") | Some("last_match") => {}
        Some("error") => anyhow::bail!(
            "feed error: {}",
            root["message"].as_str().unwrap_or("unknown")
        ),
        _ => return Ok(None),
    }

    let product_id = root["product_id"]
        .as_str()
        .context("missing field product_id")?
        .to_string();
    let trade_id = root["trade_id"].as_u64().context("missing field trade_id")?;
    let sequence = root["sequence"].as_u64().context("missing field sequence")?;
    let side = root["side"]
        .as_str()
        .context("missing field side")?
        .to_string();
    let size = parse_string_f64(&root["size"], "size")?;
    let price = parse_string_f64(&root["price"], "price")?;
    let time = root["time"]
        .as_str()
        .context("missing field time")?
        .parse::<DateTime<Utc>>()
        .context("failed to parse time")?;

    Ok(Some(WsMatch {
        product_id,
        trade_id,
        sequence,
        side,
        size,
        price,
        time,
    }))
}

/// The feed sends decimals as JSON strings.
fn parse_string_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_match_ok() {
        let json = r#"{
            "type": "match",
            "trade_id": 10,
            "sequence": 50,
            "maker_order_id": "ac928c66-ca53-498f-9c13-a110027a60e8",
            "taker_order_id": "132fb6ae-456b-4654-b4e0-d681ac05cea1",
            "time": "2014-11-07T08:19:27.028459Z",
            "product_id": "BTC-USD",
            "size": "5.23512",
            "price": "400.23",
            "side": "sell"
        }"#;
        let m = parse_match(json).unwrap().expect("should be a match");
        assert_eq!(m.product_id, "BTC-USD");
        assert_eq!(m.trade_id, 10);
        assert_eq!(m.sequence, 50);
        assert_eq!(m.side, "sell");
        assert!((m.size - 5.23512).abs() < f64::EPSILON);
        assert!((m.price - 400.23).abs() < f64::EPSILON);
        assert_eq!(m.time.timestamp(), 1_415_348_367);
    }

    #[test]
    fn parse_non_match_is_ignored() {
        let json = r#"{ "type": "subscriptions", "channels": [] }"#;
        assert!(parse_match(json).unwrap().is_none());
        let json = r#"{ "type": "heartbeat", "sequence": 90 }"#;
        assert!(parse_match(json).unwrap().is_none());
    }

    #[test]
    fn parse_error_message_is_error() {
        let json = r#"{ "type": "error", "message": "Failed to subscribe" }"#;
        let err = parse_match(json).unwrap_err();
        assert!(err.to_string().contains("Failed to subscribe"));
    }

    #[test]
    fn parse_match_missing_price_is_error() {
        let json = r#"{ "type": "match", "trade_id": 1, "sequence": 2,
            "time": "2014-11-07T08:19:27Z", "product_id": "ETH-USD",
            "size": "1.0", "side": "buy" }"#;
        assert!(parse_match(json).is_err());
    }

    #[test]
    fn subscribe_message_lists_products() {
        let msg = subscribe_message(&["ETH-USD".to_string(), "BTC-USD".to_string()]);
        let v: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["type"], "subscribe");
        assert_eq!(v["product_ids"][1], "BTC-USD");
        assert_eq!(v["channels"][0], "matches");
    }

    #[tokio::test]
    async fn empty_product_list_returns_immediately() {
        let (tx, _rx) = mpsc::channel(1);
        let (_quit_tx, quit_rx) = watch::channel(false);
        run_match_feed("ws://127.0.0.1:1", &[], tx, quit_rx)
            .await
            .unwrap();
    }
}
