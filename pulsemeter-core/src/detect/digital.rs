//! Debounced Digital Pulse Detection
//!
//! ## Overview
//!
//! A reed or proximity switch does not produce clean edges: the contact
//! bounces, so a single raw read near a transition is meaningless. The
//! classic cure is read consensus - a transition counts only once the line
//! reports the same value several times in a row.
//!
//! Two pieces implement this:
//!
//! - [`Stabilizer`]: a bounded consensus buffer. The driver feeds it one
//!   raw read per short tick until it either confirms a value
//!   ([`PULSE_CONFIRM_COUNT`] consecutive equal reads) or exhausts its
//!   budget, which is a [`PulseError::Bounce`] - a wiring or electrical
//!   fault the process must not paper over.
//! - [`DigitalPulseDetector`]: the persistent confirmed-value machine. It
//!   decides when a provisional read warrants stabilization and whether
//!   the stabilized outcome is a real transition or absorbed jitter.
//!
//! The sleep cadence between reads lives in the async driver; these types
//! only make decisions, which keeps them testable read-by-read.
//!
//! ```
//! use pulsemeter_core::detect::digital::{DigitalPulseDetector, Stabilizer, Transition};
//!
//! let mut detector = DigitalPulseDetector::new(false);
//! assert!(detector.needs_confirmation(true));
//!
//! let mut stabilizer = Stabilizer::new();
//! let mut confirmed = None;
//! for read in [true, true, true] {
//!     confirmed = stabilizer.observe(read).unwrap();
//! }
//! assert_eq!(confirmed, Some(true));
//!
//! // Confirmed active level: this is the pulse.
//! assert_eq!(
//!     detector.resolve(true, true),
//!     Transition::Confirmed { value: true }
//! );
//! ```

use heapless::Vec;

use crate::constants::{PULSE_CONFIRM_COUNT, STABILIZE_CAPACITY};
use crate::errors::{PulseError, PulseResult};

/// Outcome of a stabilization pass against a provisional read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The line settled on `value`; adopt it as the confirmed level
    Confirmed {
        /// The newly confirmed level; `true` is the active polarity
        value: bool,
    },
    /// The line settled back on the old level; the provisional read was
    /// contact bounce
    AbsorbedJitter,
}

/// Bounded consensus buffer for one stabilization attempt
///
/// Ephemeral: create a fresh one per suspected transition. The buffer is
/// kept rather than a bare run counter so a bounce error can report how
/// much was read before giving up.
#[derive(Debug, Default)]
pub struct Stabilizer {
    reads: Vec<bool, STABILIZE_CAPACITY>,
}

impl Stabilizer {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of raw reads consumed so far
    pub fn reads(&self) -> usize {
        self.reads.len()
    }

    /// Feed one raw read.
    ///
    /// Returns `Ok(Some(value))` once the last [`PULSE_CONFIRM_COUNT`]
    /// reads agree, `Ok(None)` while consensus is still open, and
    /// [`PulseError::Bounce`] when the buffer fills without consensus.
    pub fn observe(&mut self, value: bool) -> PulseResult<Option<bool>> {
        // Capacity equals the retry budget, so a full buffer below is the
        // budget exhausted, not a storage failure.
        let _ = self.reads.push(value);

        let n = self.reads.len();
        if n >= PULSE_CONFIRM_COUNT
            && self.reads[n - PULSE_CONFIRM_COUNT..].iter().all(|&v| v == value)
        {
            return Ok(Some(value));
        }

        if self.reads.is_full() {
            return Err(PulseError::Bounce { reads: n as u32 });
        }
        Ok(None)
    }
}

/// Persistent confirmed-value state machine for a debounced boolean line
///
/// `true` is the active polarity (the hardware adapter maps its idle/active
/// electrical levels onto this before the value gets here).
#[derive(Debug, Clone, Copy)]
pub struct DigitalPulseDetector {
    confirmed: bool,
}

impl DigitalPulseDetector {
    /// Detector with an initial confirmed level.
    ///
    /// The driver obtains the initial level from a full stabilization pass
    /// at startup, so a meter parked on the active level does not count a
    /// phantom pulse at boot.
    pub fn new(initial: bool) -> Self {
        Self { confirmed: initial }
    }

    /// Currently confirmed level
    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    /// Does this provisional read disagree with the confirmed level?
    pub fn needs_confirmation(&self, raw: bool) -> bool {
        raw != self.confirmed
    }

    /// Resolve a stabilization outcome against the provisional read that
    /// triggered it.
    ///
    /// A confirmed transition to the active polarity is the pulse; the
    /// caller emits the event.
    pub fn resolve(&mut self, provisional: bool, stabilized: bool) -> Transition {
        if stabilized == provisional {
            self.confirmed = stabilized;
            Transition::Confirmed { value: stabilized }
        } else {
            Transition::AbsorbedJitter
        }
    }
}
