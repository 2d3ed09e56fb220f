// =============================================================================
// FeedIngestor — long-lived feed task with backfill bootstrap and reconnect
// =============================================================================
//
// Sole writer into the pressure window.  Connection lifecycle:
// Disconnected -> Connecting -> Streaming -> (on error) Disconnected, looping
// for the lifetime of the process.  Transport failures are never fatal; the
// last good window keeps being served while the ingestor reconnects.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::binance::client::BinanceClient;
use crate::config::RuntimeConfig;
use crate::market_data::stream::run_kline_stream;
use crate::market_data::window::{InsertOutcome, PressureWindow};

pub struct FeedIngestor {
    symbol: String,
    interval: String,
    capacity: usize,
    backoff: Duration,
    backfill_on_start: bool,
    window: Arc<PressureWindow>,
    client: BinanceClient,
}

impl FeedIngestor {
    pub fn new(config: &RuntimeConfig, window: Arc<PressureWindow>, client: BinanceClient) -> Self {
        Self {
            symbol: config.symbol.clone(),
            interval: config.interval.clone(),
            capacity: config.capacity,
            backoff: Duration::from_secs(config.reconnect_backoff_secs),
            backfill_on_start: config.backfill_on_start,
            window,
            client,
        }
    }

    /// Run the feed for the lifetime of the process.
    ///
    /// Seeds the window from a klines backfill when configured, then loops
    /// connect -> stream -> backoff forever.  Only process shutdown ends it.
    pub async fn run(self) {
        if self.backfill_on_start {
            self.backfill().await;
        }

        loop {
            match run_kline_stream(&self.symbol, &self.interval, &self.window).await {
                Ok(()) => {
                    warn!(
                        symbol = %self.symbol,
                        backoff_secs = self.backoff.as_secs(),
                        "kline stream ended -- reconnecting"
                    );
                }
                Err(e) => {
                    error!(
                        symbol = %self.symbol,
                        error = %e,
                        backoff_secs = self.backoff.as_secs(),
                        "kline stream error -- reconnecting"
                    );
                }
            }
            tokio::time::sleep(self.backoff).await;
        }
    }

    /// Seed the window with the most recent finalized bars, oldest first,
    /// through the same `insert` path the live stream uses.
    ///
    /// A backfill failure is not fatal: the engine starts with an empty
    /// window and fills from the live stream.
    async fn backfill(&self) {
        // One extra row: the response's trailing kline is the still-open
        // interval and is filtered out below.
        let limit = (self.capacity as u32 + 1).min(1000);

        match self
            .client
            .get_klines(&self.symbol, &self.interval, limit)
            .await
        {
            Ok(bars) => {
                let mut inserted = 0usize;
                for bar in bars.into_iter().filter(|b| b.is_final) {
                    if self.window.insert(bar) == InsertOutcome::Inserted {
                        inserted += 1;
                    }
                }
                info!(
                    symbol = %self.symbol,
                    interval = %self.interval,
                    inserted,
                    "window seeded from klines backfill"
                );
            }
            Err(e) => {
                warn!(
                    symbol = %self.symbol,
                    error = %e,
                    "klines backfill failed -- starting with an empty window"
                );
            }
        }
    }
}
