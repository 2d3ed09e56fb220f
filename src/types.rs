// =============================================================================
// Shared types used across the volpulse engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// A single OHLCV bar as received from the kline feed or the backfill source.
///
/// `open_time` doubles as the unique sort key for the rolling window; only
/// bars with `is_final == true` are ever admitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBar {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Taker-buy base volume. Binance supplies it; other sources may not.
    pub taker_buy_volume: Option<f64>,
    pub is_final: bool,
}

/// Discrete pressure signal assigned to a bar relative to its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureLabel {
    StrongBuy,
    Buy,
    StrongSell,
    Sell,
    Neutral,
}

impl PressureLabel {
    /// Presentation tag associated with this label.
    pub fn severity(&self) -> SeverityTag {
        match self {
            Self::StrongBuy => SeverityTag::DarkGreen,
            Self::Buy => SeverityTag::Green,
            Self::StrongSell => SeverityTag::DarkRed,
            Self::Sell => SeverityTag::Red,
            Self::Neutral => SeverityTag::Gray,
        }
    }
}

impl std::fmt::Display for PressureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongBuy => write!(f, "StrongBuy"),
            Self::Buy => write!(f, "Buy"),
            Self::StrongSell => write!(f, "StrongSell"),
            Self::Sell => write!(f, "Sell"),
            Self::Neutral => write!(f, "Neutral"),
        }
    }
}

/// Color/weight tag the dashboard renders for a pressure label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeverityTag {
    #[serde(rename = "darkgreen")]
    DarkGreen,
    #[serde(rename = "green")]
    Green,
    #[serde(rename = "darkred")]
    DarkRed,
    #[serde(rename = "red")]
    Red,
    #[serde(rename = "gray")]
    Gray,
}

impl std::fmt::Display for SeverityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DarkGreen => write!(f, "darkgreen"),
            Self::Green => write!(f, "green"),
            Self::DarkRed => write!(f, "darkred"),
            Self::Red => write!(f, "red"),
            Self::Gray => write!(f, "gray"),
        }
    }
}

/// How the per-bar buy/sell delta is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaRule {
    /// Tick rule using taker-buy volume when the feed supplies it, falling
    /// back to [`DeltaRule::SignOnly`] when it does not.
    TickRule,
    /// Assign the whole bar volume to the buy or sell side by the sign of
    /// `close - open`.
    SignOnly,
}

impl Default for DeltaRule {
    fn default() -> Self {
        Self::TickRule
    }
}

impl std::fmt::Display for DeltaRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TickRule => write!(f, "TickRule"),
            Self::SignOnly => write!(f, "SignOnly"),
        }
    }
}

/// A [`RawBar`] enriched at insertion time with its classification.
///
/// `delta` and `label` are fixed when the bar enters the window; `is_spike`
/// is recomputed whenever the window's membership changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedBar {
    #[serde(flatten)]
    pub bar: RawBar,
    pub delta: f64,
    pub label: PressureLabel,
    pub severity: SeverityTag,
    pub is_spike: bool,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_mapping_matches_palette() {
        assert_eq!(PressureLabel::StrongBuy.severity(), SeverityTag::DarkGreen);
        assert_eq!(PressureLabel::Buy.severity(), SeverityTag::Green);
        assert_eq!(PressureLabel::StrongSell.severity(), SeverityTag::DarkRed);
        assert_eq!(PressureLabel::Sell.severity(), SeverityTag::Red);
        assert_eq!(PressureLabel::Neutral.severity(), SeverityTag::Gray);
    }

    #[test]
    fn severity_serializes_as_color_string() {
        let json = serde_json::to_string(&SeverityTag::DarkGreen).unwrap();
        assert_eq!(json, "\"darkgreen\"");
        let json = serde_json::to_string(&SeverityTag::Gray).unwrap();
        assert_eq!(json, "\"gray\"");
    }

    #[test]
    fn delta_rule_defaults_to_tick_rule() {
        assert_eq!(DeltaRule::default(), DeltaRule::TickRule);
    }

    #[test]
    fn classified_bar_flattens_raw_fields() {
        let bar = ClassifiedBar {
            bar: RawBar {
                open_time: 1_700_000_000_000,
                close_time: 1_700_000_299_999,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume: 42.0,
                taker_buy_volume: Some(30.0),
                is_final: true,
            },
            delta: 18.0,
            label: PressureLabel::Buy,
            severity: PressureLabel::Buy.severity(),
            is_spike: false,
        };
        let json = serde_json::to_value(&bar).unwrap();
        assert_eq!(json["open_time"], 1_700_000_000_000_i64);
        assert_eq!(json["label"], "Buy");
        assert_eq!(json["severity"], "green");
    }
}
