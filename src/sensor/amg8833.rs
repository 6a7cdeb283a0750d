//! Linux I2C driver for the Panasonic AMG8833 thermal grid sensor.
//!
//! The sensor exposes its 8x8 pixel array as 64 little-endian 12-bit
//! two's-complement registers starting at 0x80, scaled at 0.25 degC/LSB.
//! Reads go through the kernel's i2c-dev interface.

use crate::sensor::types::{SensorError, ThermalFrame, GRID_CELLS};
use crate::sensor::ThermalSensor;
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;

/// Default I2C character device on a Raspberry Pi.
pub const DEFAULT_BUS: &str = "/dev/i2c-1";

/// Factory default address of the AMG8833.
pub const DEFAULT_ADDRESS: u16 = 0x69;

/// First pixel register (T01L).
const PIXEL_BASE_REG: u8 = 0x80;

/// Degrees Celsius per raw LSB.
const PIXEL_SCALE: f64 = 0.25;

/// AMG8833 thermal sensor on a Linux I2C bus.
pub struct Amg8833Sensor {
    dev: LinuxI2CDevice,
}

impl Amg8833Sensor {
    /// Open the sensor on the given bus and address.
    pub fn open(bus: &str, address: u16) -> Result<Self, SensorError> {
        let dev = LinuxI2CDevice::new(bus, address)
            .map_err(|e| SensorError::BusUnavailable(e.to_string()))?;
        Ok(Self { dev })
    }

    /// Open the sensor at the factory defaults (`/dev/i2c-1`, address 0x69).
    pub fn open_default() -> Result<Self, SensorError> {
        Self::open(DEFAULT_BUS, DEFAULT_ADDRESS)
    }
}

impl ThermalSensor for Amg8833Sensor {
    fn read_frame(&mut self) -> Result<ThermalFrame, SensorError> {
        // Set the register pointer, then read the whole pixel block.
        let mut raw = [0u8; GRID_CELLS * 2];
        self.dev
            .write(&[PIXEL_BASE_REG])
            .map_err(|e| SensorError::ReadFailed(e.to_string()))?;
        self.dev
            .read(&mut raw)
            .map_err(|e| SensorError::ReadFailed(e.to_string()))?;

        let mut cells = [0.0; GRID_CELLS];
        for (i, cell) in cells.iter_mut().enumerate() {
            let lo = raw[i * 2] as u16;
            let hi = raw[i * 2 + 1] as u16;
            *cell = decode_pixel(lo | (hi << 8));
        }
        Ok(ThermalFrame::from_cells(cells))
    }
}

/// Decode one 12-bit two's-complement pixel value to degrees Celsius.
fn decode_pixel(raw: u16) -> f64 {
    let raw = raw & 0x0fff;
    let signed = if raw & 0x0800 != 0 {
        raw as i16 - 0x1000
    } else {
        raw as i16
    };
    signed as f64 * PIXEL_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_positive_pixel() {
        // 28.0 degC = 112 LSB
        assert_eq!(decode_pixel(112), 28.0);
        assert_eq!(decode_pixel(0), 0.0);
        assert_eq!(decode_pixel(1), 0.25);
    }

    #[test]
    fn test_decode_negative_pixel() {
        // -0.25 degC in 12-bit two's complement
        assert_eq!(decode_pixel(0x0fff), -0.25);
        // -20.0 degC = -80 LSB
        assert_eq!(decode_pixel(0x1000u16.wrapping_sub(80) & 0x0fff), -20.0);
    }

    #[test]
    fn test_decode_masks_upper_bits() {
        assert_eq!(decode_pixel(0xf070), decode_pixel(0x0070));
    }
}
