//! Pulse Event Processing and Publish Throttling
//!
//! ## Overview
//!
//! The processor owns the running consumption count and the flow gauge.
//! Detector events arrive; it converts pulses into liters, marks sensor
//! liveness, keeps the gauge fed (heartbeats feed it too, which is what
//! lets the estimate decay), and decides when a snapshot is worth
//! publishing.
//!
//! ## Throttling
//!
//! Publishing every event would hammer the broker with identical
//! payloads. A snapshot is emitted when any field changed since the last
//! emission, or when [`MIN_PUBLISH_INTERVAL_MS`] elapsed regardless - the
//! ceiling guarantees downstream consumers can distinguish "no change"
//! from "publisher gone".
//!
//! The `absolute` field is the `-1` sentinel: this sensor counts pulses
//! and cannot read the meter's absolute register.

use std::sync::Arc;

use crate::constants::MIN_PUBLISH_INTERVAL_MS;
use crate::detect::PulseEvent;
use crate::gauge::FlowGauge;
use crate::liveness::LivenessMarker;
use crate::time::Timestamp;

/// One publishable reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Absolute meter reading in liters; `-1` when unknown
    pub absolute_liters: i64,
    /// Liters counted since process start
    pub relative_liters: u64,
    /// Current flow estimate in mL/s
    pub flow_mlps: i64,
}

/// Owns the cumulative count and gauge; reacts to detector events
#[derive(Debug)]
pub struct PulseEventProcessor {
    liters: u64,
    liters_per_pulse: u64,
    gauge: FlowGauge,
    marker: Arc<LivenessMarker>,
    min_publish_interval_ms: u64,
    published: Option<Snapshot>,
    published_at: Timestamp,
}

impl PulseEventProcessor {
    /// Processor counting `liters_per_pulse` per pulse event
    pub fn new(
        gauge: FlowGauge,
        marker: Arc<LivenessMarker>,
        liters_per_pulse: u64,
        now: Timestamp,
    ) -> Self {
        Self {
            liters: 0,
            liters_per_pulse,
            gauge,
            marker,
            min_publish_interval_ms: MIN_PUBLISH_INTERVAL_MS,
            published: None,
            published_at: now,
        }
    }

    /// Override the publish ceiling (tests mostly)
    pub fn set_min_publish_interval(&mut self, interval_ms: u64) {
        self.min_publish_interval_ms = interval_ms;
    }

    /// Liters counted so far
    pub fn liters(&self) -> u64 {
        self.liters
    }

    /// Handle one detector event; returns a snapshot when it should be
    /// published.
    pub fn handle(&mut self, event: PulseEvent) -> Option<Snapshot> {
        match event {
            PulseEvent::Pulse { timestamp, .. } => {
                self.liters += self.liters_per_pulse;
                self.marker.touch(timestamp);
                self.update(timestamp)
            }
            PulseEvent::Heartbeat { timestamp } => self.update(timestamp),
        }
    }

    fn update(&mut self, now: Timestamp) -> Option<Snapshot> {
        self.gauge.record(now, self.liters);

        let snapshot = Snapshot {
            absolute_liters: -1,
            relative_liters: self.liters,
            flow_mlps: self.gauge.milliliters_per_second(),
        };

        let stale = now.saturating_sub(self.published_at) >= self.min_publish_interval_ms;
        if self.published != Some(snapshot) || stale {
            self.published = Some(snapshot);
            self.published_at = now;
            Some(snapshot)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(liters_per_pulse: u64) -> PulseEventProcessor {
        let marker = Arc::new(LivenessMarker::new(0));
        PulseEventProcessor::new(FlowGauge::new(), marker, liters_per_pulse, 0)
    }

    fn pulse(timestamp: Timestamp) -> PulseEvent {
        PulseEvent::Pulse {
            timestamp,
            flow_hint_mlps: None,
        }
    }

    #[test]
    fn first_event_always_publishes() {
        let mut proc = processor(1);
        let snapshot = proc.handle(PulseEvent::Heartbeat { timestamp: 100 });
        assert_eq!(
            snapshot,
            Some(Snapshot {
                absolute_liters: -1,
                relative_liters: 0,
                flow_mlps: 0,
            })
        );
    }

    #[test]
    fn pulses_accumulate_configured_liters() {
        let mut proc = processor(10);
        proc.handle(pulse(1_000));
        proc.handle(pulse(2_000));
        assert_eq!(proc.liters(), 20);
    }

    #[test]
    fn pulse_touches_the_liveness_marker() {
        let marker = Arc::new(LivenessMarker::new(0));
        let mut proc =
            PulseEventProcessor::new(FlowGauge::new(), Arc::clone(&marker), 1, 0);

        proc.handle(pulse(5_000));
        assert_eq!(marker.idle_ms(6_000), 1_000);

        // Heartbeats are not sensor activity
        proc.handle(PulseEvent::Heartbeat { timestamp: 9_000 });
        assert_eq!(marker.idle_ms(9_000), 4_000);
    }

    #[test]
    fn unchanged_snapshots_inside_the_interval_are_suppressed() {
        let mut proc = processor(1);
        assert!(proc.handle(PulseEvent::Heartbeat { timestamp: 0 }).is_some());

        for t in (1_000..60_000).step_by(1_000) {
            assert!(proc.handle(PulseEvent::Heartbeat { timestamp: t }).is_none());
        }
    }

    #[test]
    fn stale_snapshot_republishes_exactly_once() {
        let mut proc = processor(1);
        proc.set_min_publish_interval(10_000);
        assert!(proc.handle(PulseEvent::Heartbeat { timestamp: 0 }).is_some());
        assert!(proc.handle(PulseEvent::Heartbeat { timestamp: 9_999 }).is_none());

        // Ceiling reached: one unchanged snapshot goes out
        let snapshot = proc.handle(PulseEvent::Heartbeat { timestamp: 10_000 });
        assert_eq!(
            snapshot,
            Some(Snapshot {
                absolute_liters: -1,
                relative_liters: 0,
                flow_mlps: 0,
            })
        );
        // And the clock restarts
        assert!(proc.handle(PulseEvent::Heartbeat { timestamp: 10_001 }).is_none());
    }

    #[test]
    fn changed_count_publishes_immediately() {
        let mut proc = processor(1);
        proc.handle(PulseEvent::Heartbeat { timestamp: 0 });

        let snapshot = proc.handle(pulse(500)).expect("count change publishes");
        assert_eq!(snapshot.relative_liters, 1);
    }
}
