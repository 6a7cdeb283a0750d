//! Simulated thermal sensor.
//!
//! Serves scripted frames (or scripted failures) in order, then falls back
//! to a flat ambient frame. This is the sensor used by the test suite and
//! by builds on targets without an I2C bus.

use crate::sensor::types::{SensorError, ThermalFrame};
use crate::sensor::ThermalSensor;
use std::collections::VecDeque;

/// Ambient temperature reported once the script runs out.
const AMBIENT_C: f64 = 20.0;

/// A sensor that replays a scripted sequence of readings.
pub struct SimSensor {
    script: VecDeque<Result<ThermalFrame, SensorError>>,
    reads: u64,
}

impl SimSensor {
    /// Create a sensor with an empty script (always reads ambient).
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            reads: 0,
        }
    }

    /// API parity with the hardware sensor so platform-default
    /// construction works on any target.
    pub fn open_default() -> Result<Self, SensorError> {
        Ok(Self::new())
    }

    /// Queue a frame to be returned by a future read.
    pub fn push_frame(&mut self, frame: ThermalFrame) {
        self.script.push_back(Ok(frame));
    }

    /// Queue a read failure.
    pub fn push_failure(&mut self) {
        self.script
            .push_back(Err(SensorError::ReadFailed("scripted failure".into())));
    }

    /// Number of reads performed so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl Default for SimSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl ThermalSensor for SimSensor {
    fn read_frame(&mut self) -> Result<ThermalFrame, SensorError> {
        self.reads += 1;
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(ThermalFrame::uniform(AMBIENT_C)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_order_then_ambient() {
        let mut sensor = SimSensor::new();
        sensor.push_frame(ThermalFrame::uniform(30.0));
        sensor.push_failure();

        assert_eq!(sensor.read_frame().unwrap().max_temp(), 30.0);
        assert!(sensor.read_frame().is_err());
        assert_eq!(sensor.read_frame().unwrap().max_temp(), AMBIENT_C);
        assert_eq!(sensor.reads(), 3);
    }
}
