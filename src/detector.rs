//! Presence detection over thermal frames.
//!
//! A frame indicates presence when at least `required_pixels` cells read at
//! or above the temperature threshold. The boundary is inclusive: a cell
//! exactly at the threshold counts as hot.

use crate::sensor::ThermalFrame;

/// The outcome of evaluating one thermal frame.
///
/// Carries no history; derived deterministically from the frame and the
/// detector settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceSignal {
    /// Whether the frame indicates a person in view.
    pub present: bool,
    /// Number of cells at or above the threshold.
    pub hot_pixels: usize,
    /// Hottest cell in the frame, for diagnostics.
    pub max_temp: f64,
}

impl PresenceSignal {
    /// The signal used when no frame could be read.
    pub fn absent() -> Self {
        Self {
            present: false,
            hot_pixels: 0,
            max_temp: f64::NEG_INFINITY,
        }
    }
}

/// Turns thermal frames into presence signals.
///
/// Pure and total: evaluation never fails and performs no I/O. A failed
/// frame read is the caller's concern.
#[derive(Debug, Clone, Copy)]
pub struct PresenceDetector {
    threshold: f64,
    required_pixels: usize,
}

impl PresenceDetector {
    /// Create a detector with the given temperature threshold (degC) and
    /// minimum hot-pixel count.
    pub fn new(threshold: f64, required_pixels: usize) -> Self {
        Self {
            threshold,
            required_pixels,
        }
    }

    /// Evaluate a frame.
    pub fn evaluate(&self, frame: &ThermalFrame) -> PresenceSignal {
        let hot_pixels = frame.iter().filter(|&t| t >= self.threshold).count();
        PresenceSignal {
            present: hot_pixels >= self.required_pixels,
            hot_pixels,
            max_temp: frame.max_temp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::GRID_CELLS;

    fn frame_with_hot_cells(count: usize, hot: f64, rest: f64) -> ThermalFrame {
        let mut frame = ThermalFrame::uniform(rest);
        for i in 0..count {
            frame.set(i / 8, i % 8, hot);
        }
        frame
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        // Exactly 3 cells at exactly 28.0 with threshold 28.0 and a
        // 3-pixel requirement must trigger.
        let detector = PresenceDetector::new(28.0, 3);
        let frame = frame_with_hot_cells(3, 28.0, 20.0);

        let signal = detector.evaluate(&frame);
        assert!(signal.present);
        assert_eq!(signal.hot_pixels, 3);
        assert_eq!(signal.max_temp, 28.0);
    }

    #[test]
    fn test_below_required_count_is_absent() {
        let detector = PresenceDetector::new(28.0, 3);
        let frame = frame_with_hot_cells(2, 35.0, 20.0);

        let signal = detector.evaluate(&frame);
        assert!(!signal.present);
        assert_eq!(signal.hot_pixels, 2);
    }

    #[test]
    fn test_hot_pixel_count_matches_cells_at_or_above_threshold() {
        let detector = PresenceDetector::new(25.0, 1);
        let mut frame = ThermalFrame::uniform(24.9);
        frame.set(0, 0, 25.0);
        frame.set(7, 7, 30.0);

        assert_eq!(detector.evaluate(&frame).hot_pixels, 2);

        let all_hot = ThermalFrame::uniform(25.0);
        assert_eq!(detector.evaluate(&all_hot).hot_pixels, GRID_CELLS);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let detector = PresenceDetector::new(28.0, 3);
        let frame = frame_with_hot_cells(5, 29.5, 18.0);

        let a = detector.evaluate(&frame);
        let b = detector.evaluate(&frame);
        assert_eq!(a, b);
    }

    #[test]
    fn test_absent_signal() {
        let signal = PresenceSignal::absent();
        assert!(!signal.present);
        assert_eq!(signal.hot_pixels, 0);
    }
}
