// =============================================================================
// Binance REST API Client — public market data
// =============================================================================
//
// Only the public klines endpoint is used (backfill bootstrap), so no request
// signing is required.
// =============================================================================

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::types::RawBar;

/// Binance REST API client for public market-data endpoints.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        debug!("BinanceClient initialised (base_url=https://api.binance.com)");

        Self {
            base_url: "https://api.binance.com".to_string(),
            client,
        }
    }

    /// GET /api/v3/klines (public — no signature required).
    ///
    /// Returns bars parsed from Binance's array-of-arrays response format in
    /// ascending time order.  The trailing row of a klines response is the
    /// still-open interval and is returned with `is_final == false`; every
    /// preceding row is finalized.
    ///
    /// Array indices:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades,
    ///   [9] takerBuyBaseVolume, [10] takerBuyQuoteVolume
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<RawBar>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /api/v3/klines returned {}: {}", status, body);
        }

        let bars = parse_kline_rows(&body)?;

        debug!(symbol, interval, count = bars.len(), "klines fetched");
        Ok(bars)
    }
}

/// Parse a klines response body (array of 11+-element arrays) into bars.
///
/// Every row is marked finalized except the last, which is the currently
/// open interval.
fn parse_kline_rows(body: &serde_json::Value) -> Result<Vec<RawBar>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut bars = Vec::with_capacity(raw.len());

    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;

        if arr.len() < 11 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = arr[0].as_i64().context("kline openTime is not an integer")?;
        let open = parse_str_f64(&arr[1])?;
        let high = parse_str_f64(&arr[2])?;
        let low = parse_str_f64(&arr[3])?;
        let close = parse_str_f64(&arr[4])?;
        let volume = parse_str_f64(&arr[5])?;
        let close_time = arr[6].as_i64().context("kline closeTime is not an integer")?;
        let taker_buy_volume = Some(parse_str_f64(&arr[9])?);

        bars.push(RawBar {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
            taker_buy_volume,
            is_final: true,
        });
    }

    if let Some(last) = bars.last_mut() {
        last.is_final = false;
    }

    Ok(bars)
}

/// Helper: Binance sends prices and volumes as JSON strings.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse kline field as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .context("kline field is not a valid f64"),
        _ => anyhow::bail!("kline field has unexpected JSON type"),
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> serde_json::Value {
        serde_json::json!([
            [
                1700000000000_i64, "100.0", "102.0", "99.0", "101.0", "50.0",
                1700000299999_i64, "5050.0", 120, "30.0", "3030.0", "0"
            ],
            [
                1700000300000_i64, "101.0", "103.0", "100.0", "102.0", "80.0",
                1700000599999_i64, "8160.0", 200, "55.0", "5610.0", "0"
            ]
        ])
    }

    #[test]
    fn parse_rows_maps_fields_and_marks_trailing_row_open() {
        let bars = parse_kline_rows(&sample_rows()).unwrap();
        assert_eq!(bars.len(), 2);

        assert_eq!(bars[0].open_time, 1_700_000_000_000);
        assert_eq!(bars[0].close_time, 1_700_000_299_999);
        assert!((bars[0].open - 100.0).abs() < f64::EPSILON);
        assert!((bars[0].volume - 50.0).abs() < f64::EPSILON);
        assert_eq!(bars[0].taker_buy_volume, Some(30.0));
        assert!(bars[0].is_final);

        // Trailing row is the in-progress interval.
        assert!(!bars[1].is_final);
    }

    #[test]
    fn parse_rows_skips_short_entries() {
        let body = serde_json::json!([
            [1700000000000_i64, "100.0"],
            [
                1700000300000_i64, "101.0", "103.0", "100.0", "102.0", "80.0",
                1700000599999_i64, "8160.0", 200, "55.0", "5610.0", "0"
            ]
        ]);
        let bars = parse_kline_rows(&body).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open_time, 1_700_000_300_000);
    }

    #[test]
    fn parse_rows_rejects_non_array_body() {
        assert!(parse_kline_rows(&serde_json::json!({"code": -1121})).is_err());
    }

    #[test]
    fn parse_rows_empty_body_is_empty() {
        let bars = parse_kline_rows(&serde_json::json!([])).unwrap();
        assert!(bars.is_empty());
    }
}
