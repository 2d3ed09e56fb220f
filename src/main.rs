// =============================================================================
// volpulse — Main Entry Point
// =============================================================================
//
// Volume-pressure indicator engine: one kline stream in, one rolling window
// of classified bars out.  The feed ingestor is the sole writer; readers copy
// state out through the SignalReader facade.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod binance;
mod config;
mod market_data;
mod snapshot;
mod types;

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::binance::BinanceClient;
use crate::config::RuntimeConfig;
use crate::market_data::{Classifier, FeedIngestor, PressureWindow};
use crate::snapshot::SignalReader;

/// Config file read at startup and saved on shutdown.
const CONFIG_PATH: &str = "volpulse.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        volpulse — Volume Pressure Engine                ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override instrument from env if available.
    if let Ok(sym) = std::env::var("VOLPULSE_SYMBOL") {
        let sym = sym.trim().to_uppercase();
        if !sym.is_empty() {
            config.symbol = sym;
        }
    }
    if let Ok(iv) = std::env::var("VOLPULSE_INTERVAL") {
        let iv = iv.trim().to_string();
        if !iv.is_empty() {
            config.interval = iv;
        }
    }

    info!(
        symbol = %config.symbol,
        interval = %config.interval,
        capacity = config.capacity,
        strong_ratio = config.strong_ratio,
        spike_multiplier = config.spike_multiplier,
        delta_rule = %config.delta_rule,
        "Configured stream"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let classifier = Classifier::new(config.strong_ratio, config.delta_rule);
    let window = Arc::new(PressureWindow::new(
        config.capacity,
        classifier,
        config.spike_multiplier,
    ));
    let reader = SignalReader::new(config.symbol.clone(), config.interval.clone(), window.clone());

    // ── 3. Spawn the feed ingestor ───────────────────────────────────────
    let ingestor = FeedIngestor::new(&config, window.clone(), BinanceClient::new());
    tokio::spawn(ingestor.run());
    info!("Feed ingestor launched");

    // ── 4. Signal log loop ───────────────────────────────────────────────
    // Periodic consumer of the read facade; the HTTP layer queries the same
    // SignalReader surface.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            match reader.latest_signal() {
                Ok(bar) => info!(
                    open_time = bar.bar.open_time,
                    label = %bar.label,
                    severity = %bar.severity,
                    delta = bar.delta,
                    is_spike = bar.is_spike,
                    "latest pressure signal"
                ),
                Err(e) => info!(reason = %e, "no signal available yet"),
            }
            if let Ok(hist) = reader.historical_signal() {
                info!(
                    candles = hist.candles.len(),
                    average_volume = hist.average_volume,
                    "window summary"
                );
            }
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = config.save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("volpulse shut down complete.");
    Ok(())
}
