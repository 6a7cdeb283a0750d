//! Thermal sensor access.
//!
//! The monitor only ever sees the [`ThermalSensor`] capability: one
//! on-demand read of the full temperature grid. On Linux this binds to the
//! AMG8833 over I2C; elsewhere (and in tests) a simulated sensor serves
//! scripted frames.

pub mod types;

#[cfg(target_os = "linux")]
pub mod amg8833;

pub mod sim;

pub use types::{SensorError, ThermalFrame, GRID_CELLS, GRID_SIDE};

#[cfg(target_os = "linux")]
pub use amg8833::Amg8833Sensor;

pub use sim::SimSensor;

/// On-demand access to the thermal grid.
pub trait ThermalSensor {
    /// Read one fresh frame from the sensor.
    fn read_frame(&mut self) -> Result<ThermalFrame, SensorError>;
}

/// Default sensor for the target platform.
#[cfg(target_os = "linux")]
pub type PlatformSensor = Amg8833Sensor;

/// Default sensor for the target platform.
#[cfg(not(target_os = "linux"))]
pub type PlatformSensor = SimSensor;
