// =============================================================================
// Pressure Classifier — per-bar buy/sell delta and label
// =============================================================================

use crate::types::{ClassifiedBar, DeltaRule, PressureLabel, RawBar};

/// Classification strategy for a single bar against its predecessor.
///
/// The strong-signal ratio threshold and the delta-computation rule are
/// selected once at construction; every bar that enters the window is
/// classified with the same policy.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    strong_ratio: f64,
    delta_rule: DeltaRule,
}

impl Classifier {
    pub fn new(strong_ratio: f64, delta_rule: DeltaRule) -> Self {
        Self {
            strong_ratio,
            delta_rule,
        }
    }

    /// Net buy/sell volume pressure for a single bar.
    ///
    /// Tick rule: taker-buy volume is the buy side, the remainder of the bar
    /// volume is the sell side.  Without taker-buy data the whole volume is
    /// assigned by the sign of `close - open`.
    pub fn delta(&self, bar: &RawBar) -> f64 {
        match self.delta_rule {
            DeltaRule::TickRule => match bar.taker_buy_volume {
                Some(taker_buy) => taker_buy - (bar.volume - taker_buy),
                None => sign_only_delta(bar),
            },
            DeltaRule::SignOnly => sign_only_delta(bar),
        }
    }

    /// Classify `curr` against its immediate predecessor.
    ///
    /// Pure and deterministic: the same two bars always yield the same
    /// `(delta, label)` pair.  The first bar of a stream has no predecessor
    /// and is always `Neutral`.
    pub fn classify(&self, curr: &RawBar, prev: Option<&ClassifiedBar>) -> (f64, PressureLabel) {
        let delta = self.delta(curr);

        let prev = match prev {
            Some(p) => p,
            None => return (delta, PressureLabel::Neutral),
        };

        // Floor the denominator at 1.0 so a zero-delta predecessor does not
        // amplify every successor into a strong signal.
        let ratio = delta.abs() / prev.delta.abs().max(1.0);

        let label = if ratio >= self.strong_ratio {
            if delta > 0.0 {
                PressureLabel::StrongBuy
            } else if delta < 0.0 {
                PressureLabel::StrongSell
            } else {
                PressureLabel::Neutral
            }
        } else if delta > 0.0 {
            PressureLabel::Buy
        } else if delta < 0.0 {
            PressureLabel::Sell
        } else {
            PressureLabel::Neutral
        };

        (delta, label)
    }
}

fn sign_only_delta(bar: &RawBar) -> f64 {
    if bar.close > bar.open {
        bar.volume
    } else if bar.close < bar.open {
        -bar.volume
    } else {
        0.0
    }
}
