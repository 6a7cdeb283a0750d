//! Thermal frame type shared by all sensor implementations.

/// Cells per side of the thermal grid (fixed by the AMG8833 hardware).
pub const GRID_SIDE: usize = 8;

/// Total number of cells in a thermal frame.
pub const GRID_CELLS: usize = GRID_SIDE * GRID_SIDE;

/// One complete reading of the thermal grid, in degrees Celsius, row-major.
///
/// Frames are read fresh on every poll and discarded after presence
/// detection; nothing in the system retains them.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalFrame {
    cells: [f64; GRID_CELLS],
}

impl ThermalFrame {
    /// Create a frame from row-major cell values.
    pub fn from_cells(cells: [f64; GRID_CELLS]) -> Self {
        Self { cells }
    }

    /// Create a frame where every cell reads the same temperature.
    pub fn uniform(celsius: f64) -> Self {
        Self {
            cells: [celsius; GRID_CELLS],
        }
    }

    /// Temperature at the given grid position.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.cells[row * GRID_SIDE + col]
    }

    /// Overwrite the temperature at the given grid position.
    pub fn set(&mut self, row: usize, col: usize, celsius: f64) {
        self.cells[row * GRID_SIDE + col] = celsius;
    }

    /// Iterate over all cell temperatures in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.cells.iter().copied()
    }

    /// Hottest cell in the frame.
    pub fn max_temp(&self) -> f64 {
        self.cells.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Coldest cell in the frame.
    pub fn min_temp(&self) -> f64 {
        self.cells.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Mean temperature across the frame.
    pub fn mean_temp(&self) -> f64 {
        self.cells.iter().sum::<f64>() / GRID_CELLS as f64
    }
}

/// Errors that can occur while reading the thermal sensor.
#[derive(Debug)]
pub enum SensorError {
    /// The I2C bus could not be opened or addressed.
    BusUnavailable(String),
    /// A bus transaction failed mid-read.
    ReadFailed(String),
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::BusUnavailable(e) => write!(f, "sensor bus unavailable: {e}"),
            SensorError::ReadFailed(e) => write!(f, "sensor read failed: {e}"),
        }
    }
}

impl std::error::Error for SensorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_frame_stats() {
        let frame = ThermalFrame::uniform(21.5);
        assert_eq!(frame.max_temp(), 21.5);
        assert_eq!(frame.min_temp(), 21.5);
        assert!((frame.mean_temp() - 21.5).abs() < 1e-9);
    }

    #[test]
    fn test_set_and_get() {
        let mut frame = ThermalFrame::uniform(20.0);
        frame.set(3, 4, 31.0);
        assert_eq!(frame.get(3, 4), 31.0);
        assert_eq!(frame.get(3, 5), 20.0);
        assert_eq!(frame.max_temp(), 31.0);
    }
}
