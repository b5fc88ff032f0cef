//! Pulse detection and flow estimation engine for PulseMeter
//!
//! Turns a utility meter's mechanical pulse into a monotone consumption
//! counter and a smoothed flow-rate estimate. Three tightly coupled pieces:
//!
//! - Debounced digital pulse detection (a jittery GPIO line into confirmed
//!   transitions)
//! - Adaptive analog pulse detection (a drifting sensor reading into
//!   hysteresis-gated edges via online calibration)
//! - An online derivative gauge over the irregularly-sampled counter, plus
//!   a liveness watchdog so a dead sensor is never reported as "zero usage
//!   forever"
//!
//! Everything here is deterministic: no I/O, no hidden clocks. Timestamps
//! are passed in explicitly, which is what makes the state machines
//! testable with scripted inputs.
//!
//! ```
//! use pulsemeter_core::gauge::FlowGauge;
//!
//! let mut gauge = FlowGauge::new();
//! gauge.record(0, 0);
//! gauge.record(1000, 1);
//! gauge.record(2000, 2);
//!
//! assert_eq!(gauge.milliliters_per_second(), 1000);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod detect;
pub mod errors;
pub mod gauge;
pub mod liveness;
pub mod time;
pub mod window;

#[cfg(feature = "std")]
pub mod processor;

// Public API
pub use detect::PulseEvent;
pub use errors::{PulseError, PulseResult};
pub use gauge::{DecayPolicy, FlowGauge};
pub use time::Timestamp;

/// Crate version, embedded in published payloads as `dbg_version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
