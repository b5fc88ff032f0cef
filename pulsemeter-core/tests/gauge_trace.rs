//! Exact flow-gauge traces against a captured field sequence
//!
//! One morning of water usage, recorded as `(clock, liters)` pairs fed on
//! every poll: a slow first liter, a steady 50 mL/s stretch, a pause, a
//! dribble, then a fast draw with an abrupt stop. Both decay policies are
//! locked to their exact integer outputs over the full sequence; any
//! change to the windowing or decay arithmetic shows up here.

use pulsemeter_core::gauge::{DecayPolicy, FlowGauge};

/// "h:m:s.mmm" into absolute milliseconds
fn clock_ms(clock: &str) -> u64 {
    let mut parts = clock.split(':');
    let h: u64 = parts.next().unwrap().parse().unwrap();
    let m: u64 = parts.next().unwrap().parse().unwrap();
    let (s, ms) = parts.next().unwrap().split_once('.').unwrap();
    let s: u64 = s.parse().unwrap();
    let ms: u64 = ms.parse().unwrap();
    ((h * 60 + m) * 60 + s) * 1000 + ms
}

fn run_trace(policy: DecayPolicy, rows: &[(&str, u64, i64)]) {
    let mut gauge = FlowGauge::with_policy(policy);
    for &(clock, liters, expected_mlps) in rows {
        gauge.record(clock_ms(clock), liters);
        assert_eq!(
            gauge.milliliters_per_second(),
            expected_mlps,
            "unexpected flow at ({clock}, {liters}) with {policy:?}",
        );
    }
}

#[test]
fn timeout_ratio_policy_reproduces_the_captured_trace() {
    run_trace(
        DecayPolicy::TimeoutRatio,
        &[
            // At rest
            ("10:10:00.000", 0, 0),
            ("10:11:00.000", 0, 0),
            ("10:12:00.000", 0, 0),
            // +1
            ("10:12:20.000", 1, 0),
            ("10:12:30.000", 1, 0),
            ("10:12:40.000", 1, 0),
            ("10:12:50.000", 1, 0),
            // +1 liter every 20 s
            ("10:13:00.000", 2, 25),
            ("10:13:20.000", 3, 50),
            ("10:13:40.000", 4, 50),
            ("10:14:00.000", 5, 50),
            // Nothing for a while
            ("10:14:30.000", 5, 20),
            ("10:15:00.000", 5, 0),
            // And then a slow dribble
            ("10:15:30.000", 6, 11),
            ("10:16:00.000", 6, 8),
            ("10:16:30.000", 7, 16),
            ("10:17:00.000", 7, 11),
            ("10:17:30.000", 8, 16),
            ("10:18:00.000", 8, 11),
            // Fast draw and a quick stop
            ("10:19:00.000", 8, 6),
            ("10:20:00.000", 12, 26),
            ("10:20:10.000", 16, 400),
            ("10:20:20.000", 16, 0),
            ("10:20:30.000", 16, 0),
        ],
    );
}

#[test]
fn hypothetical_flow_policy_over_the_same_sequence() {
    // Same input, the canonical policy: it holds the estimate while a
    // continuing flow is still plausible (the 10:14:30 and 10:20:20 rows
    // are where the two policies visibly part ways) and releases to zero
    // only once another count is overdue.
    run_trace(
        DecayPolicy::HypotheticalFlow,
        &[
            ("10:10:00.000", 0, 0),
            ("10:11:00.000", 0, 0),
            ("10:12:00.000", 0, 0),
            ("10:12:20.000", 1, 0),
            ("10:12:30.000", 1, 0),
            ("10:12:40.000", 1, 0),
            ("10:12:50.000", 1, 0),
            ("10:13:00.000", 2, 25),
            ("10:13:20.000", 3, 50),
            ("10:13:40.000", 4, 50),
            ("10:14:00.000", 5, 50),
            ("10:14:30.000", 5, 50),
            ("10:15:00.000", 5, 0),
            ("10:15:30.000", 6, 11),
            ("10:16:00.000", 6, 11),
            ("10:16:30.000", 7, 16),
            ("10:17:00.000", 7, 16),
            ("10:17:30.000", 8, 16),
            ("10:18:00.000", 8, 16),
            ("10:19:00.000", 8, 16),
            ("10:20:00.000", 12, 26),
            ("10:20:10.000", 16, 400),
            ("10:20:20.000", 16, 400),
            ("10:20:30.000", 16, 0),
        ],
    );
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    /// Strictly increasing (timestamp, count) feeds with interleaved
    /// unchanged-count polls
    fn feeds() -> impl Strategy<Value = Vec<(u64, u64)>> {
        // Deltas keep both axes strictly increasing on count changes
        prop::collection::vec((1u64..120_000, 0u64..4, 0u64..240_000), 3..60).prop_map(
            |deltas| {
                let mut t = 0u64;
                let mut count = 0u64;
                let mut feed = Vec::new();
                for (dt, dc, idle) in deltas {
                    t += dt;
                    count += dc;
                    feed.push((t, count));
                    if idle > 0 {
                        // A later poll with the count unchanged
                        feed.push((t + idle, count));
                        t += idle;
                    }
                }
                feed
            },
        )
    }

    proptest! {
        #[test]
        fn flow_is_never_negative(feed in feeds(), timeout in prop::bool::ANY) {
            let policy = if timeout {
                DecayPolicy::TimeoutRatio
            } else {
                DecayPolicy::HypotheticalFlow
            };
            let mut gauge = FlowGauge::with_policy(policy);
            for (t, count) in feed {
                gauge.record(t, count);
                prop_assert!(gauge.flow_units_per_ms() >= 0.0);
                prop_assert!(gauge.milliliters_per_second() >= 0);
            }
        }

        #[test]
        fn count_reads_back_latest(feed in feeds()) {
            let mut gauge = FlowGauge::new();
            let mut latest = 0;
            for (t, count) in feed {
                gauge.record(t, count);
                latest = count;
            }
            prop_assert_eq!(gauge.current_count(), latest);
        }
    }
}
