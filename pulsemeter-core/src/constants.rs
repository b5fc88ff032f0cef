//! Timing, calibration, and flow constants
//!
//! Every magic number in the detection pipeline lives here with its unit
//! in the name or the doc line. Values mirror the deployed sensor
//! electronics (LJ12A3-4-Z/BX proximity switch on GPIO, SS49-class Hall
//! sensor behind an ADS1115 on I2C).

use crate::time::Timestamp;

// --- Digital debounce ---

/// Consecutive equal raw reads required to confirm a state transition.
pub const PULSE_CONFIRM_COUNT: usize = 3;

/// Stabilization buffer capacity; reaching it without consensus is a
/// bounce error (wiring fault, not something to retry silently).
pub const STABILIZE_CAPACITY: usize = 100;

/// Sleep between raw reads while stabilizing a suspected transition.
pub const STABILIZE_INTERVAL_MS: u64 = 10;

/// Sleep between raw reads during normal polling.
pub const POLL_INTERVAL_MS: u64 = 100;

// --- No-pulse heartbeat cadence ---

/// A heartbeat fires at least this often, pulses or not.
pub const IDLE_HEARTBEAT_MS: u64 = 60_000;

/// Heartbeat cadence while a pulse happened recently, so downstream flow
/// estimates refresh quickly right after activity.
pub const ACTIVE_HEARTBEAT_MS: u64 = 1_000;

/// How long after a pulse the fast cadence applies.
pub const ACTIVE_WINDOW_MS: u64 = 60_000;

// --- Analog calibration ---

/// Raw samples buffered per calibration pass.
pub const CALIBRATION_CAPACITY: usize = 800;

/// Minimum calibrated span in raw units (readings are 16-bit).
pub const MIN_CALIBRATION_SPAN: i32 = 500;

/// Milliliters spanned by the meter indicator's high state. Measured at
/// roughly 11% of one 10 L revolution; used for the falling-edge flow
/// hint.
pub const PULSE_SPAN_ML: f64 = 1100.0;

// --- Liveness ---

/// Watchdog poll cadence.
pub const WATCHDOG_INTERVAL_MS: u64 = 1_000;

/// Ceiling on sensor silence before the process is failed. A day of no
/// usage at all is read as a stuck or disconnected sensor.
pub const LIVENESS_LIMIT_MS: u64 = 86_400_000;

// --- Publishing ---

/// Unchanged snapshots are still re-published at least this often, so
/// downstream consumers can tell "no change" from "no publisher".
pub const MIN_PUBLISH_INTERVAL_MS: u64 = 300_000;

/// Conversion from counter-units (liters) per millisecond to mL/s.
pub const MLPS_PER_LITER_PER_MS: f64 = 1_000_000.0;

/// Helper: milliseconds for a given number of whole seconds.
pub const fn seconds(s: u64) -> Timestamp {
    s * 1_000
}
