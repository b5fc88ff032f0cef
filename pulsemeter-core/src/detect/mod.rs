//! Pulse detection - the digital and analog detector variants
//!
//! Both variants reduce raw sensor readings to the same two-event
//! vocabulary, so the processor downstream never cares which physical
//! sensor is attached:
//!
//! - a **pulse**: one confirmed unit-of-consumption event, and
//! - a **heartbeat**: an explicit "still alive, count unchanged" marker
//!   that lets the flow gauge decay between pulses.
//!
//! The digital variant debounces a boolean line by read consensus
//! ([`digital`]); the analog variant gates a drifting reading through
//! calibrated hysteresis thresholds ([`analog`], [`calibrator`]). The
//! no-pulse cadence is its own small state machine ([`heartbeat`]).

pub mod analog;
pub mod calibrator;
pub mod digital;
pub mod heartbeat;

pub use analog::{AnalogPulseDetector, Edge};
pub use calibrator::{AnalogCalibrator, CalibrationRange};
pub use digital::{DigitalPulseDetector, Stabilizer, Transition};
pub use heartbeat::HeartbeatSchedule;

use crate::time::Timestamp;

/// Event contract shared by both detector variants
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PulseEvent {
    /// One confirmed unit-of-consumption event
    Pulse {
        /// When the pulse was confirmed
        timestamp: Timestamp,
        /// Instantaneous flow estimated from the pulse's own shape, when
        /// the detector can derive one (analog falling edges only)
        flow_hint_mlps: Option<f64>,
    },
    /// Periodic no-pulse marker; the count is unchanged
    Heartbeat {
        /// When the heartbeat fired
        timestamp: Timestamp,
    },
}

impl PulseEvent {
    /// Event timestamp
    pub fn timestamp(&self) -> Timestamp {
        match self {
            PulseEvent::Pulse { timestamp, .. } => *timestamp,
            PulseEvent::Heartbeat { timestamp } => *timestamp,
        }
    }

    /// True for pulse events
    pub fn is_pulse(&self) -> bool {
        matches!(self, PulseEvent::Pulse { .. })
    }
}
