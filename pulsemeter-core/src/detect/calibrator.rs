//! Adaptive Range Calibration for the Analog Sensor
//!
//! ## Overview
//!
//! The Hall sensor's reading drifts with temperature, supply voltage, and
//! mounting tolerances, so fixed thresholds go stale. The calibrator
//! derives the operating range online: it buffers raw samples, and each
//! time the buffer fills it runs a calibration pass:
//!
//! 1. Sort the buffer and drop the lowest and highest 5% (outliers from
//!    electrical spikes must not stretch the range).
//! 2. Take the trimmed extremes as the candidate range.
//! 3. Merge with the established range, never narrowing below what the
//!    pass observed: the established bounds first give back one unit per
//!    side while slack beyond the minimum span remains (high first, then
//!    low), then widen to cover the candidates. The one-unit give-back is
//!    what lets the band track a signal that has drifted back toward the
//!    middle instead of freezing at historical extremes.
//! 4. Recompute the hysteresis thresholds at the lower and upper third of
//!    the span, and clear the buffer.
//!
//! The span never falls below [`MIN_CALIBRATION_SPAN`]; a first-time pass
//! on a nearly flat signal is forced up to it.
//!
//! The calibrator can start cold or be seeded with a known range
//! ([`AnalogCalibrator::with_range`]); seeding gives the edge detector
//! usable thresholds from the first read while passes keep refining them.

use heapless::Vec;

use crate::constants::{CALIBRATION_CAPACITY, MIN_CALIBRATION_SPAN};
use crate::errors::{PulseError, PulseResult};

/// A calibrated operating range and its hysteresis thresholds
///
/// Invariant: `low < threshold_falling < threshold_rising < high` and
/// `high - low >= MIN_CALIBRATION_SPAN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRange {
    /// Lowest expected raw value
    pub low: i32,
    /// Highest expected raw value
    pub high: i32,
    /// Crossing below this while high signals a falling edge
    pub threshold_falling: i32,
    /// Crossing above this while low signals a rising edge
    pub threshold_rising: i32,
}

/// Online range calibrator fed by every raw analog sample
#[derive(Debug, Default)]
pub struct AnalogCalibrator {
    samples: Vec<i32, CALIBRATION_CAPACITY>,
    low: Option<i32>,
    high: Option<i32>,
}

impl AnalogCalibrator {
    /// Cold calibrator; thresholds exist only after the first pass
    pub fn new() -> Self {
        Self::default()
    }

    /// Calibrator seeded with a known range
    pub fn with_range(low: i32, high: i32) -> Self {
        Self {
            samples: Vec::new(),
            low: Some(low),
            high: Some(high),
        }
    }

    /// Current range and thresholds, if established
    pub fn range(&self) -> Option<CalibrationRange> {
        let (low, high) = (self.low?, self.high?);
        let span = high - low;
        Some(CalibrationRange {
            low,
            high,
            threshold_falling: low + span / 3,
            threshold_rising: high - span / 3,
        })
    }

    /// Buffer one raw sample; runs a calibration pass at capacity.
    ///
    /// Returns the freshly calibrated range when a pass ran, `None`
    /// otherwise.
    pub fn feed(&mut self, value: i32) -> PulseResult<Option<CalibrationRange>> {
        // A full buffer is consumed by the pass below before the next
        // push, so this cannot drop samples.
        let _ = self.samples.push(value);

        if self.samples.is_full() {
            return self.calibrate().map(Some);
        }
        Ok(None)
    }

    /// Run a calibration pass over the buffered samples.
    ///
    /// Normally invoked by [`feed`](Self::feed) at buffer capacity.
    /// Running with fewer than 40 samples cannot trim 5% meaningfully and
    /// is a [`PulseError::CalibrationInvariant`].
    pub fn calibrate(&mut self) -> PulseResult<CalibrationRange> {
        let available = self.samples.len();
        let trim = available / 20;
        if trim <= 1 {
            return Err(PulseError::CalibrationInvariant {
                required: 40,
                available,
            });
        }

        self.samples.sort_unstable();
        let trimmed = &self.samples[trim..available - trim];
        let (candidate_low, candidate_high) = match (trimmed.first(), trimmed.last()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => {
                return Err(PulseError::CalibrationInvariant {
                    required: 40,
                    available,
                })
            }
        };

        // First pass only: adopt the candidates, forcing the minimum span.
        let mut low = self.low.unwrap_or(candidate_low);
        let mut high = self
            .high
            .unwrap_or_else(|| candidate_high.max(low + MIN_CALIBRATION_SPAN));

        // Give back one unit per side while slack remains, high first.
        if high - low - 1 > MIN_CALIBRATION_SPAN {
            high -= 1;
        }
        if high - low - 1 > MIN_CALIBRATION_SPAN {
            low += 1;
        }

        // Widen to cover what this pass observed.
        if candidate_low < low {
            low = candidate_low;
        }
        if candidate_high > high {
            high = candidate_high;
        }

        self.low = Some(low);
        self.high = Some(high);
        self.samples.clear();

        // Established above; range() cannot be None here but stays the
        // single source of the threshold arithmetic.
        self.range().ok_or(PulseError::CalibrationInvariant {
            required: 40,
            available,
        })
    }
}
