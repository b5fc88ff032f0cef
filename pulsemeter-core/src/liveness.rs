//! Dead man's switch for sensor liveness
//!
//! A stuck or disconnected sensor produces a perfectly plausible signal:
//! zero usage, forever. The watchdog breaks that ambiguity - if nothing
//! has been observed for a day, the sensor is declared dead and the
//! process fails loudly instead of reporting phantom idleness.
//!
//! [`LivenessMarker`] is the one genuinely shared variable in the system:
//! the processor task writes it on every pulse, the watchdog task reads
//! it once a second. Single writer, single reader, one atomic word -
//! relaxed ordering is sufficient.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::constants::LIVENESS_LIMIT_MS;
use crate::errors::{PulseError, PulseResult};
use crate::time::Timestamp;

/// Timestamp of the last observed sensor activity
#[derive(Debug)]
pub struct LivenessMarker {
    last_activity_ms: AtomicU64,
}

impl LivenessMarker {
    /// Marker primed with the current time, so a freshly started process
    /// gets the full ceiling before the watchdog can trip
    pub fn new(now: Timestamp) -> Self {
        Self {
            last_activity_ms: AtomicU64::new(now),
        }
    }

    /// Record activity at `now` (processor side)
    pub fn touch(&self, now: Timestamp) {
        self.last_activity_ms.store(now, Ordering::Relaxed);
    }

    /// Milliseconds of silence as of `now` (watchdog side)
    pub fn idle_ms(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.last_activity_ms.load(Ordering::Relaxed))
    }
}

/// Periodic liveness check against a fixed ceiling
#[derive(Debug, Clone, Copy)]
pub struct LivenessWatchdog {
    limit_ms: u64,
}

impl Default for LivenessWatchdog {
    fn default() -> Self {
        Self {
            limit_ms: LIVENESS_LIMIT_MS,
        }
    }
}

impl LivenessWatchdog {
    /// Watchdog with an explicit ceiling (tests mostly)
    pub fn with_limit(limit_ms: u64) -> Self {
        Self { limit_ms }
    }

    /// Fails with [`PulseError::LivenessTimeout`] once the silence
    /// reaches the ceiling. Fatal: the caller terminates the process.
    pub fn check(&self, marker: &LivenessMarker, now: Timestamp) -> PulseResult<()> {
        let idle_ms = marker.idle_ms(now);
        if idle_ms >= self.limit_ms {
            return Err(PulseError::LivenessTimeout {
                idle_ms,
                limit_ms: self.limit_ms,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_marker_is_live() {
        let marker = LivenessMarker::new(1_000_000);
        let watchdog = LivenessWatchdog::default();
        assert!(watchdog.check(&marker, 1_000_000).is_ok());
        assert!(watchdog.check(&marker, 1_000_000 + LIVENESS_LIMIT_MS - 1).is_ok());
    }

    #[test]
    fn silence_past_the_ceiling_trips() {
        let marker = LivenessMarker::new(0);
        let watchdog = LivenessWatchdog::with_limit(10_000);

        marker.touch(5_000);
        assert!(watchdog.check(&marker, 14_999).is_ok());
        assert_eq!(
            watchdog.check(&marker, 15_000),
            Err(PulseError::LivenessTimeout {
                idle_ms: 10_000,
                limit_ms: 10_000,
            })
        );
    }

    #[test]
    fn touching_resets_the_clock() {
        let marker = LivenessMarker::new(0);
        let watchdog = LivenessWatchdog::with_limit(10_000);

        for i in 1..100u64 {
            marker.touch(i * 1_000);
            assert!(watchdog.check(&marker, i * 1_000 + 9_999).is_ok());
        }
    }
}
