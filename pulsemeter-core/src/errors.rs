//! Error Types for Pulse Detection and Liveness Supervision
//!
//! Failures in this crate are values, not unwinding: `stabilize`-style
//! operations hand back a `Result` the caller routes to the supervisor.
//! A malfunctioning sensor must stop the process rather than keep
//! producing numbers, so none of these are retried locally.
//!
//! Variants are kept small (inline integers only, `Copy`) since they
//! travel through hot polling loops and task results.
//!
//! ## Error Categories
//!
//! - `Bounce`: electrical/wiring fault. The raw line never settled inside
//!   the bounded consensus budget. Terminal for the detector task.
//! - `CalibrationInvariant`: the trimmed-percentile step ran with too few
//!   buffered samples. A configuration/programming invariant, fatal.
//! - `LivenessTimeout`: the dead man's switch. No sensor activity inside
//!   the ceiling is treated as sensor failure, not as genuine zero
//!   consumption.

use thiserror_no_std::Error;

/// Result type for pulse detection operations
pub type PulseResult<T> = Result<T, PulseError>;

/// Detection and supervision errors - kept small, all fatal to their task
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseError {
    /// Raw line kept toggling; no consensus within the stabilization budget
    #[error("no stable reading after {reads} samples")]
    Bounce {
        /// Number of raw reads consumed before giving up
        reads: u32,
    },

    /// Calibration pass started with too few buffered samples
    #[error("calibration needs {required} samples, have {available}")]
    CalibrationInvariant {
        /// Minimum buffer length for the trimmed-percentile step
        required: usize,
        /// Actual buffer length when the pass ran
        available: usize,
    },

    /// Watchdog ceiling exceeded without any observed sensor activity
    #[error("no sensor activity for {idle_ms} ms (limit {limit_ms} ms)")]
    LivenessTimeout {
        /// Milliseconds since the last observed pulse or detector activity
        idle_ms: u64,
        /// The configured ceiling
        limit_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_small() {
        // Returned from polling loops; keep them register-friendly
        assert!(core::mem::size_of::<PulseError>() <= 24);
    }

    #[cfg(feature = "std")]
    #[test]
    fn display_names_the_budget() {
        let err = PulseError::Bounce { reads: 100 };
        assert_eq!(err.to_string(), "no stable reading after 100 samples");
    }
}
