// =============================================================================
// Runtime Configuration — indicator settings with atomic save
// =============================================================================
//
// Central configuration hub for the volpulse engine.  Persistence uses an
// atomic tmp + rename pattern to prevent corruption on crash.  All fields
// carry `#[serde(default)]` so that adding new fields never breaks loading an
// older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::DeltaRule;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "SOLUSDT".to_string()
}

fn default_interval() -> String {
    "5m".to_string()
}

fn default_capacity() -> usize {
    50
}

fn default_strong_ratio() -> f64 {
    1.5
}

fn default_spike_multiplier() -> f64 {
    1.0
}

fn default_reconnect_backoff_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the volpulse engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Instrument ----------------------------------------------------------

    /// Instrument symbol the engine is watching, e.g. "SOLUSDT".
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Bar interval of the kline subscription, e.g. "5m".
    #[serde(default = "default_interval")]
    pub interval: String,

    // --- Window & classification --------------------------------------------

    /// Maximum number of classified bars retained in the rolling window.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Ratio of |delta| to |previous delta| at or above which a bar is
    /// labeled StrongBuy/StrongSell rather than Buy/Sell.
    #[serde(default = "default_strong_ratio")]
    pub strong_ratio: f64,

    /// A bar is flagged as a volume spike when its volume exceeds the
    /// window's rolling average times this multiplier.
    #[serde(default = "default_spike_multiplier")]
    pub spike_multiplier: f64,

    /// How the per-bar buy/sell delta is computed.
    #[serde(default)]
    pub delta_rule: DeltaRule,

    // --- Feed lifecycle ------------------------------------------------------

    /// Seconds to wait before reconnecting after a stream failure.
    #[serde(default = "default_reconnect_backoff_secs")]
    pub reconnect_backoff_secs: u64,

    /// Seed the window from a REST klines backfill before the live stream
    /// delivers its first bar.
    #[serde(default = "default_true")]
    pub backfill_on_start: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            interval: default_interval(),
            capacity: default_capacity(),
            strong_ratio: default_strong_ratio(),
            spike_multiplier: default_spike_multiplier(),
            delta_rule: DeltaRule::default(),
            reconnect_backoff_secs: default_reconnect_backoff_secs(),
            backfill_on_start: true,
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
            symbol = %config.symbol,
            interval = %config.interval,
            capacity = config.capacity,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    ///
    /// This prevents corruption if the process crashes mid-write.
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
}
