// =============================================================================
// SignalReader — read facade served to the external query layer
// =============================================================================

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::market_data::window::PressureWindow;
use crate::types::ClassifiedBar;

/// Classification needs a predecessor, so nothing is served until the window
/// holds at least this many bars.
const MIN_BARS: usize = 2;

/// Structured error returned to callers instead of a panic or a bare miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalError {
    #[serde(rename = "insufficient data")]
    InsufficientData,
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData => write!(f, "insufficient data"),
        }
    }
}

impl std::error::Error for SignalError {}

/// Payload for the historical-signal query: the full window plus its rolling
/// average, stamped with the serving instant.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalSignal {
    pub symbol: String,
    pub interval: String,
    pub candles: Vec<ClassifiedBar>,
    pub average_volume: f64,
    pub server_time: i64,
}

/// Thread-safe, read-only view over the pressure window.
///
/// Calls are synchronous copies of current state; the feed ingestor is never
/// awaited on and never blocks a reader for more than one window transition.
pub struct SignalReader {
    symbol: String,
    interval: String,
    window: Arc<PressureWindow>,
}

impl SignalReader {
    pub fn new(
        symbol: impl Into<String>,
        interval: impl Into<String>,
        window: Arc<PressureWindow>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            window,
        }
    }

    /// The most recent classified bar.
    pub fn latest_signal(&self) -> Result<ClassifiedBar, SignalError> {
        if self.window.len() < MIN_BARS {
            return Err(SignalError::InsufficientData);
        }
        self.window.latest().ok_or(SignalError::InsufficientData)
    }

    /// The full rolling window with its volume average.
    pub fn historical_signal(&self) -> Result<HistoricalSignal, SignalError> {
        let snap = self.window.snapshot();
        if snap.candles.len() < MIN_BARS {
            return Err(SignalError::InsufficientData);
        }
        Ok(HistoricalSignal {
            symbol: self.symbol.clone(),
            interval: self.interval.clone(),
            candles: snap.candles,
            average_volume: snap.average_volume,
            server_time: Utc::now().timestamp_millis(),
        })
    }
}
