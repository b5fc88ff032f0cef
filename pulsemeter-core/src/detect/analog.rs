//! Hysteresis Edge Detection for the Analog Sensor
//!
//! ## Overview
//!
//! The meter's indicator disk carries a small magnet; once per revolution
//! the Hall reading dips through a pronounced trough. Counting those dips
//! with a single threshold would chatter whenever the reading hovers near
//! it, so the detector uses the calibrator's two thresholds as a
//! hysteresis band:
//!
//! ```text
//!  high ─────────────────────────────
//!        threshold_rising  ───▲──────    crossing up while low: rising edge
//!                (dead band - no transitions)
//!        threshold_falling ───▼──────    crossing down while high: falling edge
//!  low  ─────────────────────────────
//! ```
//!
//! The falling edge is the counted pulse. Until the first reading lands
//! outside the band the side is unknown and nothing fires.
//!
//! ## Flow hint
//!
//! The high state spans a known fraction of one revolution
//! ([`PULSE_SPAN_ML`] of the 10 L unit), so the rising-to-falling dwell
//! time yields an instantaneous flow estimate independent of the gauge's
//! windowed derivative. It rides along on the falling edge; with no prior
//! rising edge recorded the hint is withheld and the pulse still fires.

use crate::constants::PULSE_SPAN_ML;
use crate::detect::calibrator::AnalogCalibrator;
use crate::errors::PulseResult;
use crate::time::Timestamp;

/// A confirmed threshold crossing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Edge {
    /// Reading climbed above the rising threshold
    Rising,
    /// Reading dropped below the falling threshold - the counted pulse
    Falling {
        /// Flow estimated from the high-state dwell time, in mL/s
        flow_hint_mlps: Option<f64>,
    },
}

/// Calibrating hysteresis edge detector over raw analog samples
#[derive(Debug)]
pub struct AnalogPulseDetector {
    calibrator: AnalogCalibrator,
    /// `None` until the first reading outside the dead band
    was_above: Option<bool>,
    rising_at: Option<Timestamp>,
}

impl AnalogPulseDetector {
    /// Detector over the given calibrator
    pub fn new(calibrator: AnalogCalibrator) -> Self {
        Self {
            calibrator,
            was_above: None,
            rising_at: None,
        }
    }

    /// The calibrator, for range inspection and recalibration logging
    pub fn calibrator(&self) -> &AnalogCalibrator {
        &self.calibrator
    }

    /// Feed one raw sample; reports the edge it confirms, if any.
    ///
    /// Every sample also feeds the calibrator, so the thresholds keep
    /// tracking the signal while edges are being detected.
    pub fn feed(&mut self, value: i32, now: Timestamp) -> PulseResult<Option<Edge>> {
        self.calibrator.feed(value)?;

        let Some(range) = self.calibrator.range() else {
            return Ok(None);
        };

        match self.was_above {
            None => {
                // Initialize the side from the first decisive reading.
                if value < range.threshold_falling {
                    self.was_above = Some(false);
                } else if value > range.threshold_rising {
                    self.was_above = Some(true);
                }
                Ok(None)
            }
            Some(false) if value > range.threshold_rising => {
                self.was_above = Some(true);
                self.rising_at = Some(now);
                Ok(Some(Edge::Rising))
            }
            Some(true) if value < range.threshold_falling => {
                self.was_above = Some(false);
                let flow_hint_mlps = self.rising_at.and_then(|rose| {
                    let dwell_ms = now.saturating_sub(rose);
                    (dwell_ms > 0).then(|| PULSE_SPAN_ML * 1000.0 / dwell_ms as f64)
                });
                Ok(Some(Edge::Falling { flow_hint_mlps }))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> AnalogPulseDetector {
        // Seeded 16500..18500: falling threshold 17166, rising 17834
        AnalogPulseDetector::new(AnalogCalibrator::with_range(16_500, 18_500))
    }

    #[test]
    fn side_initializes_outside_the_band() {
        let mut det = detector();
        // Inside the dead band: side stays unknown
        assert_eq!(det.feed(17_500, 0).unwrap(), None);
        // Below the falling threshold: now known low, but no edge fires
        assert_eq!(det.feed(16_900, 100).unwrap(), None);
        // Climbing back above rising: a real edge
        assert_eq!(det.feed(18_000, 200).unwrap(), Some(Edge::Rising));
    }

    #[test]
    fn falling_edge_counts_and_carries_the_dwell_hint() {
        let mut det = detector();
        det.feed(16_900, 0).unwrap();
        assert_eq!(det.feed(18_000, 1_000).unwrap(), Some(Edge::Rising));

        // 11 s dwell: 1100 mL / 11 s = 100 mL/s
        let edge = det.feed(16_900, 12_000).unwrap();
        match edge {
            Some(Edge::Falling {
                flow_hint_mlps: Some(flow),
            }) => assert_eq!(flow, 100.0),
            other => panic!("expected falling edge with hint, got {other:?}"),
        }
    }

    #[test]
    fn first_falling_edge_without_rising_withholds_the_hint() {
        let mut det = detector();
        // Initialize the side from a high reading, then drop
        assert_eq!(det.feed(18_000, 0).unwrap(), None);
        assert_eq!(
            det.feed(16_900, 1_000).unwrap(),
            Some(Edge::Falling {
                flow_hint_mlps: None
            })
        );
    }

    #[test]
    fn dead_band_never_transitions() {
        let mut det = detector();
        det.feed(16_900, 0).unwrap();
        for t in 1..50u64 {
            // Hovering through the band must not produce edges
            assert_eq!(det.feed(17_400 + (t as i32 % 80), t * 100).unwrap(), None);
        }
    }
}
