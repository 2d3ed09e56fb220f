// =============================================================================
// Kline WebSocket stream — live bar feed into the pressure window
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};

use crate::market_data::window::PressureWindow;
use crate::types::RawBar;

/// Bar intervals the engine knows how to subscribe to.
const SUPPORTED_INTERVALS: &[&str] = &["1m", "3m", "5m", "15m", "1h"];

/// Build the Binance single-stream kline URL for one (symbol, interval) pair.
pub fn kline_stream_url(symbol: &str, interval: &str) -> String {
    let lower = symbol.to_lowercase();
    format!("wss://stream.binance.com:9443/ws/{lower}@kline_{interval}")
}

/// Connect to the kline WebSocket stream for a single (symbol, interval) pair
/// and feed finalized bars into `window`.
///
/// Runs until the stream disconnects or an error occurs, then returns so that
/// the caller (the ingestor) can handle reconnection.
pub async fn run_kline_stream(
    symbol: &str,
    interval: &str,
    window: &Arc<PressureWindow>,
) -> Result<()> {
    if !SUPPORTED_INTERVALS.contains(&interval) {
        warn!(
            interval = %interval,
            "unsupported kline interval requested -- it will still be subscribed"
        );
    }

    let url = kline_stream_url(symbol, interval);
    info!(url = %url, symbol = %symbol, interval = %interval, "connecting to kline WebSocket");

    let (ws_stream, _response) = connect_async(&url)
        .await
        .context("failed to connect to kline WebSocket")?;

    info!(symbol = %symbol, interval = %interval, "kline WebSocket connected");
    let (_write, mut read) = ws_stream.split();

    loop {
        match read.next().await {
            Some(Ok(msg)) => {
                if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                    handle_stream_message(&text, window);
                }
                // Silently ignore Ping / Pong / Binary / Close frames --
                // tungstenite handles pong replies automatically.
            }
            Some(Err(e)) => {
                error!(symbol = %symbol, error = %e, "kline WebSocket read error");
                return Err(e.into());
            }
            None => {
                warn!(symbol = %symbol, interval = %interval, "kline WebSocket stream ended");
                return Ok(());
            }
        }
    }
}

/// Process one text frame from the stream.
///
/// Finalized bars go through `PressureWindow::insert`; in-progress updates
/// are discarded; a parse failure is logged and the frame is skipped without
/// tearing down the stream.
fn handle_stream_message(text: &str, window: &PressureWindow) {
    match parse_kline_message(text) {
        Ok(bar) if bar.is_final => {
            debug!(
                open_time = bar.open_time,
                close = bar.close,
                volume = bar.volume,
                "finalized bar received"
            );
            window.insert(bar);
        }
        Ok(bar) => {
            // In-progress updates arrive every couple of seconds; only the
            // finalized event at interval close enters the window.
            debug!(open_time = bar.open_time, "discarding in-progress bar update");
        }
        Err(e) => {
            warn!(error = %e, "failed to parse kline message");
        }
    }
}

/// Parse a kline event into a [`RawBar`].
///
/// Expected shape (single stream):
/// ```json
/// { "e": "kline", "s": "SOLUSDT", "k": { ... } }
/// ```
/// The combined-stream envelope (`{ "stream": ..., "data": { ... } }`) is
/// also accepted.
fn parse_kline_message(text: &str) -> Result<RawBar> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse kline JSON")?;

    // Support both combined-stream envelope and direct single-stream payload.
    let data = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };

    let k = data
        .get("k")
        .context("missing field k")?;

    let open_time = k["t"].as_i64().context("missing field k.t")?;
    let close_time = k["T"].as_i64().context("missing field k.T")?;

    let open = parse_string_f64(&k["o"], "k.o")?;
    let high = parse_string_f64(&k["h"], "k.h")?;
    let low = parse_string_f64(&k["l"], "k.l")?;
    let close = parse_string_f64(&k["c"], "k.c")?;
    let volume = parse_string_f64(&k["v"], "k.v")?;

    // Taker-buy volume is optional in the data model; tolerate feeds that
    // omit it.
    let taker_buy_volume = match k.get("V") {
        Some(v) if !v.is_null() => Some(parse_string_f64(v, "k.V")?),
        _ => None,
    };

    let is_final = k["x"].as_bool().context("missing field k.x")?;

    Ok(RawBar {
        open_time,
        close_time,
        open,
        high,
        low,
        close,
        volume,
        taker_buy_volume,
        is_final,
    })
}

/// Helper: Binance sends numeric values as JSON strings inside kline objects.
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
