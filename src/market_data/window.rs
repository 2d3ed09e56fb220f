// =============================================================================
// PressureWindow — thread-safe rolling window of classified bars
// =============================================================================
//
// Single shared mutable resource of the engine: one writer (the feed
// ingestor) appends through `insert`, concurrent readers copy state out
// through `latest`/`snapshot`.  All mutation funnels through `insert` so the
// recompute-on-change invariant cannot be bypassed.
// =============================================================================

use std::collections::VecDeque;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::market_data::classifier::Classifier;
use crate::types::{ClassifiedBar, RawBar};

/// Result of a [`PressureWindow::insert`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The bar's finalized flag was not set.
    RejectedNotFinal,
    /// The bar's `open_time` was not strictly greater than the tail's.
    RejectedOutOfOrder,
}

/// Owned copy of the window contents handed to readers.
#[derive(Debug, Clone, Serialize)]
pub struct WindowSnapshot {
    pub candles: Vec<ClassifiedBar>,
    pub average_volume: f64,
}

struct WindowState {
    bars: VecDeque<ClassifiedBar>,
    rolling_average: f64,
}

/// Fixed-capacity trailing window of classified bars.
///
/// Appends at the tail, evicts the single oldest bar at the head once
/// `capacity` is exceeded.  The rolling volume average and every bar's
/// `is_spike` flag are recomputed over the full window on each accepted
/// insert, so readers always see aggregates consistent with the current
/// membership.
pub struct PressureWindow {
    inner: RwLock<WindowState>,
    capacity: usize,
    classifier: Classifier,
    spike_multiplier: f64,
}

impl PressureWindow {
    pub fn new(capacity: usize, classifier: Classifier, spike_multiplier: f64) -> Self {
        Self {
            inner: RwLock::new(WindowState {
                bars: VecDeque::with_capacity(capacity + 1),
                rolling_average: 0.0,
            }),
            capacity,
            classifier,
            spike_multiplier,
        }
    }

    /// Classify and append a finalized bar, evicting the oldest when the
    /// window is full.
    ///
    /// Rejections are no-ops: a non-final bar, a duplicate `open_time`, or a
    /// bar older than the current tail leaves size, contents, and rolling
    /// average untouched.
    pub fn insert(&self, raw: RawBar) -> InsertOutcome {
        if !raw.is_final {
            warn!(open_time = raw.open_time, "rejected non-final bar");
            return InsertOutcome::RejectedNotFinal;
        }

        let mut state = self.inner.write();

        if let Some(tail) = state.bars.back() {
            if raw.open_time <= tail.bar.open_time {
                warn!(
                    open_time = raw.open_time,
                    tail_open_time = tail.bar.open_time,
                    "rejected out-of-order or duplicate bar"
                );
                return InsertOutcome::RejectedOutOfOrder;
            }
        }

        let (delta, label) = self.classifier.classify(&raw, state.bars.back());
        let open_time = raw.open_time;

        state.bars.push_back(ClassifiedBar {
            bar: raw,
            delta,
            label,
            severity: label.severity(),
            is_spike: false,
        });

        while state.bars.len() > self.capacity {
            state.bars.pop_front();
        }

        Self::recompute(&mut state, self.spike_multiplier);

        debug!(
            open_time,
            delta,
            label = %label,
            rolling_average = state.rolling_average,
            len = state.bars.len(),
            "bar inserted"
        );

        InsertOutcome::Inserted
    }

    /// Most recently inserted classified bar, if any.
    pub fn latest(&self) -> Option<ClassifiedBar> {
        self.inner.read().bars.back().cloned()
    }

    /// Owned copy of the full window plus the current rolling average.
    pub fn snapshot(&self) -> WindowSnapshot {
        let state = self.inner.read();
        WindowSnapshot {
            candles: state.bars.iter().cloned().collect(),
            average_volume: state.rolling_average,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().bars.is_empty()
    }

    /// Recompute the rolling volume average and every bar's spike flag from
    /// the current membership.
    fn recompute(state: &mut WindowState, spike_multiplier: f64) {
        if state.bars.is_empty() {
            state.rolling_average = 0.0;
            return;
        }

        let total: f64 = state.bars.iter().map(|b| b.bar.volume).sum();
        state.rolling_average = total / state.bars.len() as f64;

        let threshold = state.rolling_average * spike_multiplier;
        for bar in state.bars.iter_mut() {
            bar.is_spike = bar.bar.volume > threshold;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeltaRule, PressureLabel, RawBar};

    fn window(capacity: usize) -> PressureWindow {
        PressureWindow::new(capacity, Classifier::new(1.5, DeltaRule::SignOnly), 1.0)
    }

    fn rising_bar(open_time: i64, volume: f64) -> RawBar {
        RawBar {
            open_time,
            close_time: open_time + 59_999,
            open: 100.0,
            high: 102.0,
            low: 99.0,
            close: 101.0,
            volume,
            taker_buy_volume: None,
            is_final: true,
        }
    }

    #[test]
    fn capacity_bound_and_monotonic_order() {
        let w = window(3);
        for i in 0..8 {
            assert_eq!(w.insert(rising_bar(i * 60_000, 10.0)), InsertOutcome::Inserted);
        }
        let snap = w.snapshot();
        assert_eq!(snap.candles.len(), 3);
        for pair in snap.candles.windows(2) {
            assert!(pair[0].bar.open_time < pair[1].bar.open_time);
        }
        assert_eq!(snap.candles[0].bar.open_time, 5 * 60_000);
    }

    #[test]
    fn rejects_non_final_bar() {
        let w = window(3);
        let mut bar = rising_bar(0, 10.0);
        bar.is_final = false;
        assert_eq!(w.insert(bar), InsertOutcome::RejectedNotFinal);
        assert!(w.is_empty());
    }

    #[test]
    fn rejects_duplicate_and_out_of_order_without_side_effects() {
        let w = window(3);
        w.insert(rising_bar(0, 10.0));
        w.insert(rising_bar(60_000, 20.0));
        let before = w.snapshot();

        assert_eq!(
            w.insert(rising_bar(60_000, 99.0)),
            InsertOutcome::RejectedOutOfOrder
        );
        assert_eq!(
            w.insert(rising_bar(30_000, 99.0)),
            InsertOutcome::RejectedOutOfOrder
        );

        let after = w.snapshot();
        assert_eq!(after.candles.len(), before.candles.len());
        assert!((after.average_volume - before.average_volume).abs() < f64::EPSILON);
        assert_eq!(after.candles[1].bar.open_time, 60_000);
        assert!((after.candles[1].bar.volume - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn uniform_volumes_produce_no_spikes() {
        let w = window(3);
        for i in 0..3 {
            w.insert(rising_bar(i * 60_000, 10.0));
        }
        let snap = w.snapshot();
        assert!((snap.average_volume - 10.0).abs() < f64::EPSILON);
        assert!(snap.candles.iter().all(|c| !c.is_spike));
    }

    #[test]
    fn eviction_recomputes_average_and_flags_spike() {
        let w = window(3);
        for i in 0..3 {
            w.insert(rising_bar(i * 60_000, 10.0));
        }
        w.insert(rising_bar(3 * 60_000, 30.0));

        let snap = w.snapshot();
        assert_eq!(snap.candles.len(), 3);
        // Window now holds volumes [10, 10, 30].
        assert!((snap.average_volume - 50.0 / 3.0).abs() < 1e-9);
        assert!(!snap.candles[0].is_spike);
        assert!(!snap.candles[1].is_spike);
        assert!(snap.candles[2].is_spike);
    }

    #[test]
    fn rolling_average_is_exact_mean_of_current_contents() {
        let w = window(4);
        let volumes = [7.0, 13.0, 20.0, 4.0];
        for (i, v) in volumes.iter().enumerate() {
            w.insert(rising_bar(i as i64 * 60_000, *v));
        }
        let snap = w.snapshot();
        let mean = volumes.iter().sum::<f64>() / volumes.len() as f64;
        assert!((snap.average_volume - mean).abs() < 1e-9);
        for c in &snap.candles {
            assert_eq!(c.is_spike, c.bar.volume > mean);
        }
    }

    #[test]
    fn spike_multiplier_raises_the_threshold() {
        let w = PressureWindow::new(3, Classifier::new(1.5, DeltaRule::SignOnly), 1.5);
        w.insert(rising_bar(0, 10.0));
        w.insert(rising_bar(60_000, 10.0));
        // avg = 11.0, threshold = 16.5 -- 13 is above the plain mean but not
        // a spike under the stricter multiplier.
        w.insert(rising_bar(120_000, 13.0));
        let snap = w.snapshot();
        assert!(snap.candles.iter().all(|c| !c.is_spike));
    }

    #[test]
    fn first_bar_is_neutral_then_strong_buy_on_ratio_jump() {
        let w = window(3);
        w.insert(rising_bar(0, 5.0));
        assert_eq!(w.latest().unwrap().label, PressureLabel::Neutral);

        // delta +5 -> +20, ratio 4.0 >= 1.5.
        w.insert(rising_bar(60_000, 20.0));
        assert_eq!(w.latest().unwrap().label, PressureLabel::StrongBuy);
    }

    #[test]
    fn modest_ratio_yields_plain_buy() {
        let w = window(3);
        w.insert(rising_bar(0, 5.0));
        // delta +5 -> +6, ratio 1.2 < 1.5.
        w.insert(rising_bar(60_000, 6.0));
        assert_eq!(w.latest().unwrap().label, PressureLabel::Buy);
    }

    #[test]
    fn labels_are_not_retroactively_recomputed() {
        let w = window(3);
        w.insert(rising_bar(0, 5.0));
        w.insert(rising_bar(60_000, 20.0));
        w.insert(rising_bar(120_000, 1.0));
        let snap = w.snapshot();
        assert_eq!(snap.candles[1].label, PressureLabel::StrongBuy);
        assert!((snap.candles[1].delta - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_is_a_stable_copy() {
        let w = window(3);
        w.insert(rising_bar(0, 10.0));
        let snap = w.snapshot();
        w.insert(rising_bar(60_000, 50.0));
        assert_eq!(snap.candles.len(), 1);
        assert!((snap.average_volume - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_window_reads() {
        let w = window(3);
        assert!(w.latest().is_none());
        let snap = w.snapshot();
        assert!(snap.candles.is_empty());
        assert_eq!(snap.average_volume, 0.0);
        assert_eq!(w.len(), 0);
    }
}
