//! Online Flow-Rate Estimation Over a Monotone Pulse Counter
//!
//! ## Overview
//!
//! The meter hands us an irregularly-timed, monotone cumulative count.
//! `FlowGauge` turns that into a current flow estimate by keeping the last
//! three distinct readings and differentiating across them, with
//! heuristics for the two situations a naive derivative gets wrong:
//!
//! - **Acceleration**: when the newest interval carries more counts than
//!   the one before it, the newest interval alone is trusted immediately
//!   instead of being averaged down.
//! - **Stop detection**: when readings repeat (tap closed, or simply
//!   between pulses), the estimate must neither drop to zero on normal
//!   sampling jitter nor stay stale forever.
//!
//! ## Decay policies
//!
//! Two stop-detection policies ship, selected at construction:
//!
//! - [`DecayPolicy::HypotheticalFlow`] (default): compute the flow we
//!   *would* have if the count were still moving, measured from a
//!   reference anchor in the window to now. While that hypothetical stays
//!   at least half of the reference flow, the flow is likely continuing
//!   and the estimate holds; below half, the valve is considered closed
//!   and the estimate drops to zero. Degrades gracefully under irregular
//!   sampling.
//! - [`DecayPolicy::TimeoutRatio`]: compare the silence against the
//!   newest inter-pulse interval; more than twice that interval without a
//!   count is a stop, anything less decays the estimate gradually by
//!   stretching the newest interval to now.
//!
//! Both are preserved deliberately - field units run either - and their
//! exact outputs are locked by the trace tests in `tests/gauge_trace.rs`.
//!
//! ## Units
//!
//! The count is fed in liters, timestamps in milliseconds, so the internal
//! rate is liters/ms. [`FlowGauge::milliliters_per_second`] converts by
//! the fixed factor 1,000,000 and truncates toward zero.

use crate::constants::MLPS_PER_LITER_PER_MS;
use crate::time::Timestamp;
use crate::window::{Sample, SampleWindow};

/// Stop-detection policy applied while the count is not moving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecayPolicy {
    /// Hold the estimate while a hypothetical continuing flow stays at
    /// least half of the reference flow; otherwise drop to zero.
    #[default]
    HypotheticalFlow,
    /// Drop to zero after twice the newest inter-pulse interval passes in
    /// silence; decay gradually until then.
    TimeoutRatio,
}

/// Online derivative estimator over the cumulative pulse count
///
/// Feed it often - every pulse and every heartbeat - via
/// [`record`](FlowGauge::record); read the estimate back at any time.
#[derive(Debug, Clone, Default)]
pub struct FlowGauge {
    window: SampleWindow,
    /// Liters per millisecond; non-negative, 0.0 until warm
    rate: f64,
    policy: DecayPolicy,
}

impl FlowGauge {
    /// Gauge with the canonical hypothetical-flow decay policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Gauge with an explicit decay policy
    pub fn with_policy(policy: DecayPolicy) -> Self {
        Self {
            window: SampleWindow::new(),
            rate: 0.0,
            policy,
        }
    }

    /// Latest recorded count, 0 if nothing was recorded yet
    pub fn current_count(&self) -> u64 {
        self.window.newest().map(|s| s.count).unwrap_or(0)
    }

    /// Current estimate in liters per millisecond
    pub fn flow_units_per_ms(&self) -> f64 {
        self.rate
    }

    /// Best guess of usage in mL/s, truncated toward zero
    pub fn milliliters_per_second(&self) -> i64 {
        (self.rate * MLPS_PER_LITER_PER_MS) as i64
    }

    /// Feed a reading of the cumulative counter
    ///
    /// Timestamps must be monotone non-decreasing, and strictly increasing
    /// whenever the count changed; both hold for a poll-driven feed.
    pub fn record(&mut self, timestamp: Timestamp, count: u64) {
        let sample = Sample { timestamp, count };

        if !self.window.is_warm() {
            // Cold start: collect three distinct readings before any
            // estimate exists.
            if self.window.record(sample) && self.window.is_warm() {
                self.recalculate();
            }
            return;
        }

        if self.window.record(sample) {
            self.recalculate();
        } else {
            self.decay(timestamp, count);
        }
    }

    /// Recompute the estimate from the warm window.
    ///
    /// Weighting depends on the timing of the two intervals: an
    /// accelerating count trusts only the newest interval, comparable
    /// interval lengths average across the full span, anything else falls
    /// back to the newest interval.
    fn recalculate(&mut self) {
        let Some((a, b, c)) = self.window.triple() else {
            return;
        };

        let t10 = (b.timestamp - a.timestamp) as f64;
        let t21 = (c.timestamp - b.timestamp) as f64;
        let p10 = (b.count - a.count) as f64;
        let p21 = (c.count - b.count) as f64;

        self.rate = if p21 > p10 {
            // More counts than last time; the newest interval wins.
            p21 / t21
        } else {
            let ratio = t21 / t10;
            if 0.8 < ratio && ratio < 1.2 {
                // Comparable intervals; average over the full span.
                (c.count - a.count) as f64 / (c.timestamp - a.timestamp) as f64
            } else {
                p21 / t21
            }
        };
    }

    fn decay(&mut self, now: Timestamp, count: u64) {
        // A zero estimate stays zero until the count moves again.
        if self.rate == 0.0 {
            return;
        }
        let Some((a, b, c)) = self.window.triple() else {
            return;
        };

        match self.policy {
            DecayPolicy::HypotheticalFlow => {
                let flow_wide =
                    (c.count - a.count) as f64 / (c.timestamp - a.timestamp) as f64;
                let flow_recent =
                    (c.count - b.count) as f64 / (c.timestamp - b.timestamp) as f64;

                // A >10% flow increase in the newest interval makes the
                // wide average lag; anchor on the newest interval then.
                let (reference, anchor) = if flow_recent > 1.1 * flow_wide {
                    (flow_recent, b)
                } else {
                    (flow_wide, a)
                };

                // The flow we would be seeing had the count kept moving.
                // The counter is monotone, so this can never exceed the
                // reference.
                let hypothetical =
                    (count - anchor.count) as f64 / (now - anchor.timestamp) as f64;
                debug_assert!(hypothetical <= reference);

                if hypothetical < 0.5 * reference {
                    // Another count was due by now; the valve is closed.
                    self.rate = 0.0;
                }
            }
            DecayPolicy::TimeoutRatio => {
                let ms_per_unit =
                    (c.timestamp - b.timestamp) as f64 / (c.count - b.count) as f64;

                if (now - c.timestamp) as f64 > 2.0 * ms_per_unit {
                    self.rate = 0.0;
                } else {
                    // Stretch the newest interval out to now.
                    self.rate = (c.count - b.count) as f64 / (now - b.timestamp) as f64;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_gauge_reads_zero() {
        let gauge = FlowGauge::new();
        assert_eq!(gauge.current_count(), 0);
        assert_eq!(gauge.milliliters_per_second(), 0);
    }

    #[test]
    fn one_liter_per_second() {
        let mut gauge = FlowGauge::new();
        gauge.record(0, 0);
        gauge.record(1000, 1);
        assert_eq!(gauge.milliliters_per_second(), 0);

        gauge.record(2000, 2);
        assert_eq!(gauge.flow_units_per_ms(), 0.001);
        assert_eq!(gauge.milliliters_per_second(), 1000);
        assert_eq!(gauge.current_count(), 2);
    }

    #[test]
    fn repeated_counts_do_not_warm_the_gauge() {
        let mut gauge = FlowGauge::new();
        gauge.record(0, 0);
        gauge.record(1000, 0);
        gauge.record(2000, 0);
        gauge.record(3000, 1);
        assert_eq!(gauge.milliliters_per_second(), 0);
    }

    #[test]
    fn acceleration_trusts_newest_interval() {
        let mut gauge = FlowGauge::new();
        gauge.record(0, 0);
        gauge.record(10_000, 1);
        gauge.record(20_000, 2);
        assert_eq!(gauge.milliliters_per_second(), 100);

        // 4 counts in the next 10 s: p21 > p10, newest interval only
        gauge.record(30_000, 6);
        assert_eq!(gauge.milliliters_per_second(), 400);
    }

    #[test]
    fn hypothetical_policy_holds_then_drops() {
        let mut gauge = FlowGauge::new();
        gauge.record(0, 1);
        gauge.record(20_000, 2);
        gauge.record(40_000, 3);
        assert_eq!(gauge.milliliters_per_second(), 50);

        // 30 s of silence: hypothetical = 2/70000 >= half of 5e-5 => hold
        gauge.record(70_000, 3);
        assert_eq!(gauge.milliliters_per_second(), 50);

        // 100 s of silence: hypothetical = 2/100000 < 2.5e-5 => closed
        gauge.record(100_000, 3);
        assert_eq!(gauge.milliliters_per_second(), 0);

        // Zero stays zero
        gauge.record(100_100, 3);
        assert_eq!(gauge.milliliters_per_second(), 0);
    }

    #[test]
    fn timeout_policy_decays_then_drops() {
        let mut gauge = FlowGauge::with_policy(DecayPolicy::TimeoutRatio);
        gauge.record(0, 1);
        gauge.record(20_000, 2);
        gauge.record(40_000, 3);
        assert_eq!(gauge.milliliters_per_second(), 50);

        // 30 s silence is under twice the 20 s interval: gradual decay,
        // 1 liter stretched over 50 s
        gauge.record(70_000, 3);
        assert_eq!(gauge.milliliters_per_second(), 20);

        // 41 s past the newest sample exceeds 2 x 20 s: stopped
        gauge.record(81_000, 3);
        assert_eq!(gauge.milliliters_per_second(), 0);
    }

    #[test]
    fn count_changes_reset_either_policy() {
        for policy in [DecayPolicy::HypotheticalFlow, DecayPolicy::TimeoutRatio] {
            let mut gauge = FlowGauge::with_policy(policy);
            gauge.record(0, 1);
            gauge.record(20_000, 2);
            gauge.record(40_000, 3);
            gauge.record(200_000, 3);
            assert_eq!(gauge.milliliters_per_second(), 0);

            // Movement again: window shifts and the estimate returns
            gauge.record(220_000, 4);
            assert!(gauge.milliliters_per_second() > 0);
        }
    }
}
