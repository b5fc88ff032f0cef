//! No-pulse heartbeat cadence
//!
//! Downstream, the flow gauge can only decay when it is fed unchanged
//! counts, and the publisher can only stay live if something keeps
//! arriving. Heartbeats provide both, on two named timers:
//!
//! - the **idle timer** fires a heartbeat at least every
//!   [`IDLE_HEARTBEAT_MS`], unconditionally;
//! - the **active timer** fires every [`ACTIVE_HEARTBEAT_MS`] but only
//!   inside [`ACTIVE_WINDOW_MS`] after the most recent pulse, so flow
//!   estimates refresh quickly right after activity and fall back to
//!   coarse heartbeats when the meter is quiet.
//!
//! Either timer being due emits one heartbeat; both measure from the same
//! last-heartbeat instant.

use crate::constants::{ACTIVE_HEARTBEAT_MS, ACTIVE_WINDOW_MS, IDLE_HEARTBEAT_MS};
use crate::time::Timestamp;

/// The two no-pulse timers and their shared reference point
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSchedule {
    idle_every_ms: u64,
    active_every_ms: u64,
    active_window_ms: u64,
    last_beat: Timestamp,
    last_pulse: Option<Timestamp>,
}

impl HeartbeatSchedule {
    /// Schedule with the default cadences, anchored at `start`
    pub fn new(start: Timestamp) -> Self {
        Self::with_cadence(start, IDLE_HEARTBEAT_MS, ACTIVE_HEARTBEAT_MS, ACTIVE_WINDOW_MS)
    }

    /// Schedule with explicit cadences (tests mostly)
    pub fn with_cadence(
        start: Timestamp,
        idle_every_ms: u64,
        active_every_ms: u64,
        active_window_ms: u64,
    ) -> Self {
        Self {
            idle_every_ms,
            active_every_ms,
            active_window_ms,
            last_beat: start,
            last_pulse: None,
        }
    }

    /// Record a confirmed pulse; opens the fast-cadence window
    pub fn note_pulse(&mut self, now: Timestamp) {
        self.last_pulse = Some(now);
    }

    /// Is a heartbeat due at `now`?
    ///
    /// The idle timer takes precedence in the sense that it needs no
    /// recent pulse; the active timer only adds beats inside its window.
    pub fn due(&self, now: Timestamp) -> bool {
        let since_beat = now.saturating_sub(self.last_beat);

        if since_beat >= self.idle_every_ms {
            return true;
        }

        match self.last_pulse {
            Some(pulse) if now.saturating_sub(pulse) < self.active_window_ms => {
                since_beat >= self.active_every_ms
            }
            _ => false,
        }
    }

    /// Record that a heartbeat was emitted at `now`
    pub fn note_beat(&mut self, now: Timestamp) {
        self.last_beat = now;
    }
}
